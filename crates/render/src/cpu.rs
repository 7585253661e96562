use crate::backend::{RenderBackend, ScenePass};
use crate::composite::CompositeShader;
use crate::error::RenderError;
use crate::filter::BloomFilter;
use crate::raster::Rasterizer;
use crate::target::{FrameImage, RenderTarget};
use afterglow_common::{Color, Viewport};
use afterglow_scene::{Camera, Scene};

#[derive(Debug)]
struct Targets {
    bloom: RenderTarget,
    scratch: RenderTarget,
    blur: RenderTarget,
    base: RenderTarget,
    composite: RenderTarget,
}

impl Targets {
    fn new(viewport: Viewport) -> Result<Self, RenderError> {
        Ok(Self {
            bloom: RenderTarget::new(viewport)?,
            scratch: RenderTarget::new(viewport)?,
            blur: RenderTarget::new(viewport)?,
            base: RenderTarget::new(viewport)?,
            composite: RenderTarget::new(viewport)?,
        })
    }
}

/// Software backend. Every pass runs on the calling thread.
#[derive(Debug, Default)]
pub struct CpuBackend {
    raster: Rasterizer,
    targets: Option<Targets>,
    presented: Option<FrameImage>,
    presented_count: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rasterizer(raster: Rasterizer) -> Self {
        Self {
            raster,
            ..Self::default()
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.targets.as_ref().map(|t| t.base.viewport())
    }

    /// Last image handed to the presentation surface.
    pub fn presented(&self) -> Option<&FrameImage> {
        self.presented.as_ref()
    }

    pub fn presented_count(&self) -> u64 {
        self.presented_count
    }

    pub fn bloom_target(&self) -> Option<&RenderTarget> {
        self.targets.as_ref().map(|t| &t.bloom)
    }

    pub fn blur_target(&self) -> Option<&RenderTarget> {
        self.targets.as_ref().map(|t| &t.blur)
    }

    pub fn base_target(&self) -> Option<&RenderTarget> {
        self.targets.as_ref().map(|t| &t.base)
    }

    pub fn composite_target(&self) -> Option<&RenderTarget> {
        self.targets.as_ref().map(|t| &t.composite)
    }

    fn targets_mut(&mut self) -> Result<&mut Targets, RenderError> {
        self.targets.as_mut().ok_or(RenderError::TargetsMissing)
    }
}

impl RenderBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn acquire_targets(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if self.viewport() == Some(viewport) {
            return Ok(());
        }
        let targets = Targets::new(viewport)?;
        tracing::debug!(%viewport, "cpu targets allocated");
        self.targets = Some(targets);
        Ok(())
    }

    fn has_targets(&self) -> bool {
        self.targets.is_some()
    }

    fn draw_scene(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        pass: ScenePass,
    ) -> Result<(), RenderError> {
        let raster = self.raster;
        let targets = self.targets_mut()?;
        let (target, clear) = match pass {
            ScenePass::Bloom => (&mut targets.bloom, Color::BLACK),
            ScenePass::Base => (&mut targets.base, scene.background),
        };
        target.clear(clear);
        let triangles = raster.draw(scene, camera, target)?;
        tracing::trace!(?pass, triangles, "scene drawn");
        Ok(())
    }

    fn bloom_filter(&mut self, filter: &BloomFilter) -> Result<(), RenderError> {
        let t = self.targets_mut()?;
        filter.apply(&mut t.bloom, &mut t.scratch, &mut t.blur)
    }

    fn composite(&mut self, shader: &CompositeShader) -> Result<(), RenderError> {
        let t = self.targets_mut()?;
        shader.apply(&t.base, &t.blur, &mut t.composite)
    }

    fn present(&mut self, exposure: f32) -> Result<(), RenderError> {
        let targets = self.targets.as_ref().ok_or(RenderError::TargetsMissing)?;
        let frame = self
            .presented
            .get_or_insert_with(|| FrameImage::new(targets.composite.viewport()));
        frame.write_from(&targets.composite, exposure);
        self.presented_count += 1;
        Ok(())
    }
}
