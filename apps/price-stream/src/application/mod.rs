//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the feed pipeline interacts with its collaborators.

/// Port interfaces (price source, enricher, sink, producer).
pub mod ports;

/// Boundary service exposed to the transport layer.
pub mod services;
