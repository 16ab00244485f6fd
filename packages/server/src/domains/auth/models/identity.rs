use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use sha2::Sha256;
use std::fmt;

use super::PhoneNumber;

type HmacSha256 = Hmac<Sha256>;

/// Number of digits in a one-time code
pub const OTP_CODE_LEN: usize = 6;

/// Server-held secret mixed into every code hash and derived password.
///
/// Never stored alongside the data it protects and never logged.
#[derive(Clone)]
pub struct Pepper(String);

impl Pepper {
    /// Returns `None` for an empty or whitespace-only secret.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    fn mac(&self, domain: &str, message: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.0.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(domain.as_bytes());
        mac.update(b":");
        mac.update(message.as_bytes());
        mac
    }

    /// Keyed hash of a code, salted with the phone it was issued to.
    pub fn hash_code(&self, phone: &PhoneNumber, code: &str) -> String {
        let message = format!("{}:{}", phone.as_e164(), code);
        hex::encode(self.mac("otp", &message).finalize().into_bytes())
    }

    /// Constant-time comparison of a submitted code against a stored hash.
    pub fn verify_code(&self, phone: &PhoneNumber, code: &str, stored_hash: &str) -> bool {
        let Ok(expected) = hex::decode(stored_hash) else {
            return false;
        };
        let message = format!("{}:{}", phone.as_e164(), code);
        self.mac("otp", &message).verify_slice(&expected).is_ok()
    }

    /// Email alias + password used to sign the phone's owner into the
    /// email/password identity provider.
    pub fn derive_identity(&self, phone: &PhoneNumber, alias_domain: &str) -> DerivedIdentity {
        let password = hex::encode(
            self.mac("password", phone.as_e164())
                .finalize()
                .into_bytes(),
        );

        DerivedIdentity {
            email: format!("{}@{}", phone.digits(), alias_domain),
            password,
        }
    }
}

impl fmt::Debug for Pepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pepper(<redacted>)")
    }
}

/// Deterministic credentials for a phone number.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedIdentity {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for DerivedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedIdentity")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Generate a zero-padded numeric code from the OS CSPRNG.
pub fn generate_code() -> String {
    let n: u32 = OsRng.gen_range(0..10u32.pow(OTP_CODE_LEN as u32));
    format!("{:0width$}", n, width = OTP_CODE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    fn pepper() -> Pepper {
        Pepper::new("test-pepper").unwrap()
    }

    #[test]
    fn test_empty_pepper_rejected() {
        assert!(Pepper::new("").is_none());
        assert!(Pepper::new("   ").is_none());
        assert!(Pepper::new("s3cret").is_some());
    }

    #[test]
    fn test_code_hash_consistency() {
        let p = phone("09123456789");
        let hash1 = pepper().hash_code(&p, "123456");
        let hash2 = pepper().hash_code(&p, "123456");
        assert_eq!(hash1, hash2, "Same phone and code should produce same hash");
        assert_eq!(hash1.len(), 64, "HMAC-SHA256 should be 64 hex characters");
        assert!(!hash1.contains("123456"));
    }

    #[test]
    fn test_code_hash_is_salted_by_phone() {
        let hash1 = pepper().hash_code(&phone("09123456789"), "123456");
        let hash2 = pepper().hash_code(&phone("09351234567"), "123456");
        assert_ne!(hash1, hash2, "Same code for different phones must differ");
    }

    #[test]
    fn test_code_hash_depends_on_pepper() {
        let p = phone("09123456789");
        let other = Pepper::new("another-pepper").unwrap();
        assert_ne!(pepper().hash_code(&p, "123456"), other.hash_code(&p, "123456"));
    }

    #[test]
    fn test_verify_code() {
        let p = phone("09123456789");
        let stored = pepper().hash_code(&p, "654321");

        assert!(pepper().verify_code(&p, "654321", &stored));
        assert!(!pepper().verify_code(&p, "654320", &stored));
        assert!(!pepper().verify_code(&phone("09351234567"), "654321", &stored));
        assert!(!pepper().verify_code(&p, "654321", "not-hex"));
    }

    #[test]
    fn test_derived_identity_is_deterministic() {
        let first = pepper().derive_identity(&phone("09123456789"), "phone.local");
        let second = pepper().derive_identity(&phone("+989123456789"), "phone.local");

        assert_eq!(first, second);
        assert_eq!(first.email, "989123456789@phone.local");
        assert_eq!(first.password.len(), 64);
    }

    #[test]
    fn test_derived_password_differs_per_phone_and_pepper() {
        let a = pepper().derive_identity(&phone("09123456789"), "phone.local");
        let b = pepper().derive_identity(&phone("09351234567"), "phone.local");
        let c = Pepper::new("rotated")
            .unwrap()
            .derive_identity(&phone("09123456789"), "phone.local");

        assert_ne!(a.password, b.password);
        assert_ne!(a.password, c.password);
        assert_eq!(a.email, c.email);
    }

    #[test]
    fn test_password_is_not_the_code_hash() {
        let p = phone("09123456789");
        let identity = pepper().derive_identity(&p, "phone.local");
        assert_ne!(identity.password, pepper().hash_code(&p, ""));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let identity = pepper().derive_identity(&phone("09123456789"), "phone.local");
        let rendered = format!("{:?} {:?}", pepper(), identity);
        assert!(!rendered.contains("test-pepper"));
        assert!(!rendered.contains(&identity.password));
    }

    #[test]
    fn test_generate_code_format() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_CODE_LEN);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
