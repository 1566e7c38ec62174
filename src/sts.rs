//! Exchange of long-lived keys for a temporary session token.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::{
    Client,
    config::Credentials,
    error::{DisplayErrorContext, SdkError},
    types,
};
use aws_smithy_types::date_time::Format;
use log::debug;

use crate::error::{Error, Result};

/// Lifetime requested for every session token.
pub const SESSION_DURATION_SECONDS: i32 = 900;

/// Parameters of a `GetSessionToken` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub serial_number: Option<String>,
    pub token_code: Option<String>,
    pub duration_seconds: i32,
}

/// Temporary credentials as they came back over the wire, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
}

/// Outcome of an exchange that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub status: u16,
    pub reason: String,
    pub credentials: Option<IssuedCredentials>,
}

/// The remote token service.
///
/// Errors are reserved for exchanges that never produced a response; a
/// rejected request comes back as a response with its status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn get_session_token(&self, request: ExchangeRequest) -> Result<ExchangeResponse>;
}

/// AWS STS through the official SDK.
#[derive(Debug, Default, Clone, Copy)]
pub struct StsExchange;

#[async_trait]
impl TokenExchange for StsExchange {
    async fn get_session_token(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
        debug!(
            "Calling STS GetSessionToken in {} for {}s",
            request.region, request.duration_seconds
        );

        let credentials = Credentials::new(
            request.access_key_id,
            request.secret_access_key,
            None,
            None,
            env!("CARGO_PKG_NAME"),
        );
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(request.region))
            .credentials_provider(credentials)
            .load()
            .await;

        let result = Client::new(&config)
            .get_session_token()
            .duration_seconds(request.duration_seconds)
            .set_serial_number(request.serial_number)
            .set_token_code(request.token_code)
            .send()
            .await;

        match result {
            Ok(output) => Ok(ExchangeResponse {
                status: 200,
                reason: "OK".to_owned(),
                credentials: output.credentials().map(issued).transpose()?,
            }),
            Err(SdkError::ServiceError(context)) => Ok(ExchangeResponse {
                status: context.raw().status().as_u16(),
                reason: DisplayErrorContext(context.err()).to_string(),
                credentials: None,
            }),
            Err(e) => Err(Error::Exchange(DisplayErrorContext(&e).to_string())),
        }
    }
}

fn issued(credentials: &types::Credentials) -> Result<IssuedCredentials> {
    Ok(IssuedCredentials {
        access_key_id: credentials.access_key_id().to_owned(),
        secret_access_key: credentials.secret_access_key().to_owned(),
        session_token: credentials.session_token().to_owned(),
        expiration: credentials
            .expiration()
            .fmt(Format::DateTime)
            .map_err(|e| Error::Exchange(e.to_string()))?,
    })
}
