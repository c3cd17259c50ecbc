//! Domain Layer - Core price types and subscription bookkeeping.
//!
//! This layer contains the core domain types for the simulated price feed
//! with no runtime dependencies. All types here are plain Rust with
//! serialization support.

/// Price sample type and feed constants.
pub mod price;

/// Subscriber tracking and producer demand.
pub mod subscription;
