use crate::config::{Config, StorageBackend};
use crate::build_rocket;
use rocket::local::asynchronous::Client;

/// Config pointing at the in-memory backend, so HTTP tests need no database.
pub fn memory_config() -> Config {
    let mut config = Config::default();
    config.database.backend = StorageBackend::Memory;
    config
}

pub async fn memory_client() -> Client {
    Client::tracked(build_rocket(memory_config())).await.expect("valid rocket instance")
}
