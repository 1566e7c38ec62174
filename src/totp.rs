//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 30 s step, 6 digits).

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::validation::Base32Seed;

const STEP_SECONDS: u64 = 30;
const DIGITS: u32 = 6;

/// Derives the code that is current right now.
pub fn now(seed: &Base32Seed) -> Option<String> {
    let unix = u64::try_from(Utc::now().timestamp()).ok()?;
    generate(seed, unix)
}

/// Derives the code for the step containing `unix_time`.
///
/// Returns `None` if the seed does not decode, which only happens for seeds
/// whose padding is misplaced.
pub fn generate(seed: &Base32Seed, unix_time: u64) -> Option<String> {
    let secret = decode(seed.as_str())?;
    hotp(&secret, unix_time / STEP_SECONDS, DIGITS)
}

fn decode(seed: &str) -> Option<Vec<u8>> {
    let unpadded = seed.trim_end_matches('=');
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, unpadded)
}

fn hotp(secret: &[u8], counter: u64, digits: u32) -> Option<String> {
    type HmacSha1 = Hmac<Sha1>;

    let mut mac = HmacSha1::new_from_slice(secret).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest[digest.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(digits);
    Some(format!("{code:0width$}", width = digits as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    // "12345678901234567890", the RFC 6238 SHA-1 test secret.
    const RFC_SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn seed(value: &str) -> Base32Seed {
        value.parse().unwrap()
    }

    #[test]
    fn matches_rfc6238_vectors() {
        let secret = decode(RFC_SEED).unwrap();
        assert_eq!(secret, b"12345678901234567890");

        for (time, expected) in [
            (59, "94287082"),
            (1_111_111_109, "07081804"),
            (1_111_111_111, "14050471"),
            (1_234_567_890, "89005924"),
            (2_000_000_000, "69279037"),
            (20_000_000_000, "65353130"),
        ] {
            assert_eq!(
                hotp(&secret, time / STEP_SECONDS, 8).as_deref(),
                Some(expected),
                "t={time}"
            );
        }
    }

    #[test]
    fn six_digit_codes_are_the_low_digits() {
        assert_eq!(generate(&seed(RFC_SEED), 59).as_deref(), Some("287082"));
        assert_eq!(generate(&seed(RFC_SEED), 1_111_111_109).as_deref(), Some("081804"));
    }

    #[test]
    fn padding_is_optional() {
        let padded = generate(&seed("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ===="), 59);
        assert_eq!(padded.as_deref(), Some("287082"));
    }

    #[test]
    fn codes_are_stable_within_a_step() {
        let seed = seed("JBSWY3DPEHPK3PXP");
        assert_eq!(generate(&seed, 60), generate(&seed, 89));
        assert_ne!(generate(&seed, 60), generate(&seed, 90));
    }

    #[test]
    fn current_code_has_six_digits() {
        let code = now(&seed("JBSWY3DPEHPK3PXP")).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
