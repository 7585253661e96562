//! Selective bloom compositor.
//!
//! Each tick renders the glow-tagged meshes alone into a bloom buffer (every
//! other mesh temporarily wears a flat suppressor material), filters and
//! blurs that buffer, renders the untouched scene into a base buffer, and
//! adds the two together for presentation.
//!
//! # Invariants
//! - Glow tags are read, never written.
//! - Suppressed materials are restored before the base pass, on every path.
//! - The material slot table is empty at every frame boundary.

mod backend;
mod bloom_pass;
mod composite;
mod cpu;
mod error;
mod filter;
mod material_override;
mod orchestrator;
mod params;
mod raster;
mod tags;
mod target;

pub use backend::{RenderBackend, ScenePass};
pub use bloom_pass::{BloomPass, BloomReport};
pub use composite::CompositeShader;
pub use cpu::CpuBackend;
pub use error::{FrameError, RenderError};
pub use filter::{BloomFilter, BrightPass, GaussianBlur, MAX_BLUR_TAPS};
pub use material_override::{MaterialOverride, MaterialSlots, Suppression, SwapStats};
pub use orchestrator::{FrameOrchestrator, FrameOutcome, FrameState, FrameStats};
pub use params::{BloomParameters, ConfigError};
pub use raster::Rasterizer;
pub use tags::{BLOOM_LAYER, TagStore};
pub use target::{FrameImage, MAX_TARGET_DIMENSION, RenderTarget};

pub fn crate_info() -> &'static str {
    "afterglow-render v0.1.0"
}
