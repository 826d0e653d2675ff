//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the relay pump (the one real use case) and the
//! port interfaces that keep it blind to both transports.

/// Port interfaces for the upstream stream and the downstream sink.
pub mod ports;

/// The relay pump: bridges one upstream stream to one downstream sink.
pub mod relay;
