//! The seam between frame orchestration and the device that draws.

use crate::composite::CompositeShader;
use crate::error::RenderError;
use crate::filter::BloomFilter;
use afterglow_common::Viewport;
use afterglow_scene::{Camera, Scene};

/// Which off-screen target a scene draw lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePass {
    /// Suppressed scene into the bloom target, cleared to black.
    Bloom,
    /// Unmodified scene into the base target, cleared to the scene background.
    Base,
}

/// A device that owns the off-screen targets and executes the passes.
///
/// Implementations keep their previous targets (and presented image) when
/// `acquire_targets` fails.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    /// (Re)create every target at `viewport`.
    fn acquire_targets(&mut self, viewport: Viewport) -> Result<(), RenderError>;

    fn has_targets(&self) -> bool;

    fn draw_scene(&mut self, scene: &Scene, camera: &Camera, pass: ScenePass)
    -> Result<(), RenderError>;

    /// Threshold the bloom target and blur it into the blur target.
    fn bloom_filter(&mut self, filter: &BloomFilter) -> Result<(), RenderError>;

    /// Combine base and blur targets into the composite target.
    fn composite(&mut self, shader: &CompositeShader) -> Result<(), RenderError>;

    /// Hand the composite to the presentation surface.
    fn present(&mut self, exposure: f32) -> Result<(), RenderError>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn acquire_targets(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        (**self).acquire_targets(viewport)
    }

    fn has_targets(&self) -> bool {
        (**self).has_targets()
    }

    fn draw_scene(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        pass: ScenePass,
    ) -> Result<(), RenderError> {
        (**self).draw_scene(scene, camera, pass)
    }

    fn bloom_filter(&mut self, filter: &BloomFilter) -> Result<(), RenderError> {
        (**self).bloom_filter(filter)
    }

    fn composite(&mut self, shader: &CompositeShader) -> Result<(), RenderError> {
        (**self).composite(shader)
    }

    fn present(&mut self, exposure: f32) -> Result<(), RenderError> {
        (**self).present(exposure)
    }
}
