//! Well-formedness checks for AWS key material.
//!
//! The predicates are used twice: to reject interactive input during setup and
//! to reject data read back from the secret store. The newtypes below carry the
//! result of a successful check so the rest of the crate never has to repeat it.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

static ACCESS_KEY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{20}$").expect("access key id pattern"));
static SECRET_ACCESS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/+=]{40}$").expect("secret key pattern"));
static MFA_DEVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+=/:,.@-]+$").expect("mfa device pattern"));
static BASE32: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z2-7=]+$").expect("base32 pattern"));

/// Exactly 20 uppercase letters or digits.
pub fn is_access_key_id(value: &str) -> bool {
    ACCESS_KEY_ID.is_match(value)
}

/// Exactly 40 characters from the base64 alphabet.
pub fn is_secret_access_key(value: &str) -> bool {
    SECRET_ACCESS_KEY.is_match(value)
}

/// A bare device serial or an `arn:aws:iam::<account>:mfa/<user>` ARN.
pub fn is_mfa_device(value: &str) -> bool {
    MFA_DEVICE.is_match(value)
}

/// A TOTP seed in the RFC 4648 base32 alphabet, padding allowed.
pub fn is_base32(value: &str) -> bool {
    BASE32.is_match(value)
}

/// Rejection produced when a string fails one of the predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    pub kind: &'static str,
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid {}", self.kind)
    }
}

impl std::error::Error for InvalidValue {}

macro_rules! validated {
    ($(#[$meta:meta])* $name:ident, $check:path, $kind:literal, redact = $redact:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = InvalidValue;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                if $check(value) {
                    Ok(Self(value.to_owned()))
                } else {
                    Err(InvalidValue { kind: $kind })
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidValue;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if $check(&value) {
                    Ok(Self(value))
                } else {
                    Err(InvalidValue { kind: $kind })
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if $redact {
                    write!(f, "{}(***)", stringify!($name))
                } else {
                    write!(f, "{}({:?})", stringify!($name), self.0)
                }
            }
        }
    };
}

validated!(
    /// Long-lived or temporary access key id.
    AccessKeyId, is_access_key_id, "AWS access key id", redact = false
);
validated!(
    /// Secret half of an access key pair.
    SecretAccessKey, is_secret_access_key, "AWS secret access key", redact = true
);
validated!(
    /// MFA device serial number or ARN.
    MfaDevice, is_mfa_device, "MFA device serial or ARN", redact = false
);
validated!(
    /// Base32 TOTP seed of a virtual MFA device.
    Base32Seed, is_base32, "base32 MFA seed", redact = true
);
