//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{GoTrueAdapter, PostgresOtpStore, ServerDeps, SmsIrAdapter};
pub use traits::*;
