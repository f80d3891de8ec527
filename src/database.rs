pub mod browser_session;
pub mod memory_repository;
pub mod postgres_repository;
