use crate::backend::{RenderBackend, ScenePass};
use crate::error::RenderError;
use crate::filter::BloomFilter;
use crate::material_override::{MaterialOverride, SwapStats};
use crate::orchestrator::FrameState;
use crate::params::BloomParameters;
use afterglow_scene::{Camera, Scene};

/// Result of one bloom sub-pass. Materials are restored whatever `result` is.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomReport {
    pub stats: SwapStats,
    pub result: Result<(), RenderError>,
}

/// Renders only the glowing meshes into the bloom target and filters it.
#[derive(Debug, Clone)]
pub struct BloomPass {
    filter: BloomFilter,
}

impl BloomPass {
    pub fn new(params: &BloomParameters) -> Self {
        Self {
            filter: BloomFilter::new(params),
        }
    }

    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }

    /// Suppress, draw, filter, restore. `enter` is told about each state as
    /// it begins.
    pub fn run<B: RenderBackend + ?Sized>(
        &self,
        over: &mut MaterialOverride,
        backend: &mut B,
        scene: &mut Scene,
        camera: &Camera,
        mut enter: impl FnMut(FrameState),
    ) -> BloomReport {
        enter(FrameState::Suppressing);
        let suppressed = over.suppress_scene(scene);

        enter(FrameState::BloomRendering);
        let result = backend
            .draw_scene(&suppressed, camera, ScenePass::Bloom)
            .and_then(|()| backend.bloom_filter(&self.filter));

        enter(FrameState::Restoring);
        let stats = suppressed.finish();
        BloomReport { stats, result }
    }
}
