use roadwatch_client::ApiError;
use roadwatch_core::error::CoreError;

/// Errors surfaced by the overlay engine.
///
/// Only acquisition failures reach the user (as a failed load state);
/// metadata failures are logged and degrade to an empty overlay.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// A backend request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A domain-level error from `roadwatch_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The camera/video identifier was not usable.
    #[error("Invalid camera identifier: {0}")]
    InvalidIdentifier(i64),

    /// The view the work belonged to was torn down first.
    #[error("Operation cancelled")]
    Cancelled,
}
