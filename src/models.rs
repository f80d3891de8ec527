pub mod browser_session;
pub mod health;
