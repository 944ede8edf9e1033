//! Common types module for the marketplace backend.
//!
//! This module defines the core data types shared by the storage, engine and
//! API layers: catalog products, carts, orders and their delivery mirror,
//! directory users, and the request/response shapes of the HTTP API.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Cart and order types, including the order status lifecycle.
pub mod order;
/// Catalog product types.
pub mod product;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces for persisted records.
pub mod storage;
/// Directory user and rider profile types.
pub mod user;
/// Utility functions shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use order::*;
pub use product::*;
pub use registry::*;
pub use storage::*;
pub use user::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
