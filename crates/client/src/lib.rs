//! Typed REST client for the Roadwatch backend.
//!
//! Provides configuration loading, the [`api::BackendApi`] wrapper around
//! the camera/stream/anomaly endpoints, and the [`api::ApiError`] type
//! shared by the overlay engine.

pub mod api;
pub mod config;

pub use api::{ApiError, BackendApi};
pub use config::ClientConfig;
