//! Shared value types used across the afterglow crates.
//!
//! Everything here is plain data: `Copy` where possible, serializable, and
//! free of rendering policy.

mod types;

pub use types::{Color, Layers, NodeId, Transform, Viewport, MAX_LAYERS};
