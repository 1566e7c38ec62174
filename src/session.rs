//! Session negotiation: the login state machine behind `session` and `exec`.
//!
//! ```text
//! cached token valid ──────────────────────────────────────────────► return
//!        │ miss
//!        ▼
//! long-lived credentials ── missing ──► NoCredentials
//!        │
//!        ├─ no MFA ──────────────────┐
//!        ├─ MFA + seed ── derive ────┤
//!        └─ MFA ───────── prompt ────┤ (may be cancelled)
//!                                    ▼
//!                         GetSessionToken (900 s)
//!                                    │
//!          status ∉ [200, 400) ◄─────┼─────► no credentials in response
//!                                    ▼
//!                           cache and return
//! ```

use clap::ValueEnum;
use log::{debug, info, warn};

use crate::{
    config::RegionLookup,
    credentials::{Mfa, SessionPayload},
    error::{Error, Result},
    profile::ProfileKey,
    prompt::OtpSource,
    sts::{ExchangeRequest, IssuedCredentials, SESSION_DURATION_SECONDS, TokenExchange},
    totp,
    vault::{KeyRing, SecretStore},
};

const OTP_INSTRUCTIONS: &str = "One-time password:";
const OTP_TITLE: &str = "AWS MFA";

/// How the resulting credentials are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// `credential_process` JSON document
    #[default]
    Json,
    /// `NAME=value` lines
    Env,
}

/// Drives a profile from whatever state it is in to a valid session token.
pub struct Negotiator<S, X, P> {
    keyring: KeyRing<S>,
    exchange: X,
    otp: P,
}

impl<S, X, P> Negotiator<S, X, P>
where
    S: SecretStore,
    X: TokenExchange,
    P: OtpSource,
{
    pub fn new(keyring: KeyRing<S>, exchange: X, otp: P) -> Self {
        Self {
            keyring,
            exchange,
            otp,
        }
    }

    /// Returns a valid session token for `profile`, exchanging for a new one
    /// only when the cache has nothing usable.
    ///
    /// # Arguments
    /// * `profile` - Keyring and config key of the profile
    /// * `region` - Region lookup, consulted only when an exchange is needed
    ///
    /// # Returns
    /// The cached payload while it is unexpired, otherwise a freshly issued
    /// one that has already been written back to the cache.
    ///
    /// # Errors
    /// * [`Error::NoCredentials`] - nothing usable was stored by `setup`
    /// * [`Error::NoRegion`] - an exchange is needed but no region is known
    /// * [`Error::Cancelled`] - the user dismissed the MFA prompt
    /// * [`Error::HttpStatus`] - STS answered outside `[200, 400)`
    /// * [`Error::CredentialsNotReturned`] - STS answered without a usable set
    pub async fn login(&self, profile: &ProfileKey, region: &RegionLookup) -> Result<SessionPayload> {
        if let Some(session) = self.keyring.get_session_token(profile).await? {
            debug!("Using cached session for [{profile}]");
            return Ok(session);
        }

        let credentials = self
            .keyring
            .get_credentials(profile)
            .await?
            .ok_or_else(|| Error::NoCredentials(profile.to_string()))?;
        let region = region.resolve(profile).await?.ok_or(Error::NoRegion)?;

        let token_code = match &credentials.mfa {
            Mfa::Disabled => None,
            Mfa::Derived { seed, .. } => match totp::now(seed) {
                Some(code) => Some(code),
                None => {
                    warn!("Stored MFA seed for [{profile}] does not decode, asking instead");
                    Some(self.prompt_code().await?)
                }
            },
            Mfa::Prompted { .. } => Some(self.prompt_code().await?),
        };

        let request = ExchangeRequest {
            access_key_id: credentials.key_id.as_str().to_owned(),
            secret_access_key: credentials.secret_key.as_str().to_owned(),
            region,
            serial_number: credentials.mfa.device().map(|device| device.as_str().to_owned()),
            token_code,
            duration_seconds: SESSION_DURATION_SECONDS,
        };

        info!("Requesting a session token for [{profile}]");
        let response = self.exchange.get_session_token(request).await?;
        if !(200..400).contains(&response.status) {
            return Err(Error::HttpStatus {
                status: response.status,
                reason: response.reason,
            });
        }

        let payload = response
            .credentials
            .and_then(payload_from)
            .ok_or(Error::CredentialsNotReturned)?;

        self.keyring.cache_session_token(profile, &payload).await?;
        info!("Session for [{profile}] expires at {}", payload.expiration);

        Ok(payload)
    }

    async fn prompt_code(&self) -> Result<String> {
        self.otp.one_time_code(OTP_INSTRUCTIONS, OTP_TITLE).await
    }
}

fn payload_from(issued: IssuedCredentials) -> Option<SessionPayload> {
    let payload = SessionPayload::new(
        issued.access_key_id.parse().ok()?,
        issued.secret_access_key.parse().ok()?,
        issued.session_token,
        issued.expiration,
    );
    payload.validate().ok()?;
    Some(payload)
}

/// Formats a payload for stdout.
pub fn render(payload: &SessionPayload, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(payload)?),
        OutputFormat::Env => Ok(payload
            .env_vars()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}
