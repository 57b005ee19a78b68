//! Inventory domain module.
//!
//! This crate contains the business rules for warehouse stock, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage). The
//! infra layer wraps these decisions in a unit of work.

pub mod admin;
pub mod movement;
pub mod product;
pub mod statistics;
pub mod window;

pub use admin::Admin;
pub use movement::{
    AcceptedMovement, MovementKind, MovementRequest, StockTransaction, apply_movement,
    reconciliation,
};
pub use product::{NewProduct, Product, ProductPatch};
pub use statistics::{LOW_STOCK_THRESHOLD, Statistics, StatisticsBuilder};
pub use window::DateWindow;
