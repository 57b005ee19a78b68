//! Infrastructure layer: ledger storage, the transaction engine, config.

pub mod config;
pub mod engine;
pub mod store;


pub use config::{Config, ConfigError};
pub use engine::{EngineError, EngineSettings, InventoryEngine};
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError, UnitOfWork};
