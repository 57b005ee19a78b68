//! Ledger store boundary.
//!
//! Durable storage for products and the append-only movement ledger, with a
//! unit-of-work abstraction for the one write that spans both.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, StoreError, UnitOfWork};
