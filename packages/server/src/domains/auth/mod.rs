//! Auth domain - phone number login via one-time codes
//!
//! Responsibilities:
//! - Phone normalization and OTP issuance/verification
//! - Keyed hashing of codes and deterministic derived credentials
//! - Bridging verified phones onto the email/password identity provider

pub mod actions;
pub mod errors;
pub mod models;
pub mod types;

pub use errors::OtpError;
pub use types::{OtpSent, OtpVerified};
