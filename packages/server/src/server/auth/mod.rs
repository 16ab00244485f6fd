pub mod session;

pub use session::{cleared_session_cookies, session_cookies};
