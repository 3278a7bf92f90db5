//! Domain logic for the Roadwatch overlay engine.
//!
//! Everything in this crate is pure and synchronous: identifiers, the
//! detection model, the frame clock, contain-fit geometry, and the two
//! frame-keyed detection stores. Network and scheduling concerns live in
//! `roadwatch-client` and `roadwatch-overlay`.

pub mod detection;
pub mod error;
pub mod frame_cache;
pub mod frame_clock;
pub mod frame_index;
pub mod geometry;
pub mod types;
pub mod video_info;
