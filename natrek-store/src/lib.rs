pub mod app_config;
pub mod memory;
pub mod pg_store;

pub use memory::MemoryStore;
pub use pg_store::PgStore;
