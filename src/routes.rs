pub mod browser_session;
pub mod error;
pub mod health;
