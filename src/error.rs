//! Error taxonomy shared by every credential component.

use thiserror::Error;

/// Failures surfaced by the credential lifecycle.
///
/// Everything except [`Error::Cancelled`] is reported by the top-level handler
/// as a single error line. Cancellation is user intent and is echoed without
/// error-level logging.
#[derive(Debug, Error)]
pub enum Error {
    /// The user dismissed an interactive prompt.
    #[error("Cancelled")]
    Cancelled,

    /// No usable long-lived credentials exist for the profile.
    #[error("No credentials have been set up for [{0}], run setup first")]
    NoCredentials(String),

    /// No region was given and none could be found in the environment or config.
    #[error("No region is set")]
    NoRegion,

    /// The token exchange answered with a status outside `[200, 400)`.
    #[error("HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    /// The token exchange succeeded but did not carry a usable credential set.
    #[error("Credentials not returned")]
    CredentialsNotReturned,

    /// No prompt mechanism is installed on this system.
    #[error("No way to prompt for the MFA code, install one of: {}", .installable.join(", "))]
    NoPrompter { installable: Vec<&'static str> },

    /// A session payload failed validation before being cached.
    #[error("Invalid session payload: {0}")]
    InvalidPayload(String),

    /// The OS secret store rejected an operation.
    #[error("Secret store error: {0}")]
    Store(String),

    /// The token exchange could not be performed at all.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// A prompt mechanism failed for a reason other than cancellation.
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// The AWS config file could not be parsed or resolved.
    #[error("AWS config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
