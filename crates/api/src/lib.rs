//! HTTP API: routing and request/response mapping over the inventory engine.

pub mod app;
pub mod middleware;
