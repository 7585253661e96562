//! wgpu backend for the selective bloom compositor.
//!
//! Scene passes draw CPU-flattened, world-space triangles into `Rgba16Float`
//! targets; bright pass, blur, composite and present run as fullscreen
//! passes reading texels 1:1.
//!
//! # Invariants
//! - Targets are only rebuilt by `acquire_targets`, never inside a pass.
//! - The backend reads the scene; it never changes materials or tags.

mod context;
mod gpu;
mod shaders;

pub use context::{GpuContext, GpuInitError};
pub use gpu::WgpuBackend;

pub fn crate_info() -> &'static str {
    "afterglow-render-wgpu v0.1.0"
}
