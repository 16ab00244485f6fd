// Phone OTP Authenticator - API Core
//
// Issues one-time codes over SMS for Iranian mobile numbers and exchanges a
// verified code for a session from the hosted identity provider.
// Domain logic lives in domains/, infrastructure seams in kernel/.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
