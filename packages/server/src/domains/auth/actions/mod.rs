//! Auth domain actions - business logic functions
//!
//! Actions are async functions called directly from the HTTP routes. They
//! only depend on `ServerDeps`, so tests drive them with mock services.

mod send_otp;
mod verify_otp;

pub use send_otp::send_otp;
pub use verify_otp::verify_otp;
