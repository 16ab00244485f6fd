pub mod identity;
pub mod otp_code;
pub mod phone;

pub use identity::{generate_code, DerivedIdentity, Pepper, OTP_CODE_LEN};
pub use otp_code::{ConsumeOutcome, NewOtpCode, OtpCode};
pub use phone::{InvalidPhoneNumber, PhoneNumber};
