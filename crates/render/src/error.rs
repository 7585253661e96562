use afterglow_common::{NodeId, Viewport};
use afterglow_scene::GeometryError;

/// Failures while acquiring targets or executing a render pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("viewport {0} has a zero dimension")]
    EmptyViewport(Viewport),
    #[error("viewport {viewport} exceeds the {max}px target limit")]
    ViewportTooLarge { viewport: Viewport, max: u32 },
    #[error("could not reserve {bytes} bytes for render target")]
    Allocation { bytes: usize },
    #[error("render targets have not been acquired")]
    TargetsMissing,
    #[error("device lost: {0}")]
    DeviceLost(String),
    #[error("node {node:?} has invalid geometry: {source}")]
    InvalidGeometry {
        node: NodeId,
        #[source]
        source: GeometryError,
    },
    #[error("image size mismatch: {expected} vs {actual}")]
    SizeMismatch { expected: Viewport, actual: Viewport },
}

impl RenderError {
    /// Acquisition failures skip the frame and are retried on the next tick.
    pub fn is_resource_failure(&self) -> bool {
        matches!(
            self,
            RenderError::EmptyViewport(_)
                | RenderError::ViewportTooLarge { .. }
                | RenderError::Allocation { .. }
                | RenderError::TargetsMissing
                | RenderError::DeviceLost(_)
        )
    }
}

/// Invariant violations surfaced by the frame orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("{count} saved material slot(s) survived a frame boundary")]
    SlotLeak { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_failures_are_classified() {
        assert!(RenderError::EmptyViewport(Viewport::new(0, 0)).is_resource_failure());
        assert!(RenderError::TargetsMissing.is_resource_failure());
        assert!(RenderError::DeviceLost("gone".into()).is_resource_failure());
        assert!(
            !RenderError::SizeMismatch {
                expected: Viewport::new(1, 1),
                actual: Viewport::new(2, 2),
            }
            .is_resource_failure()
        );
    }

    #[test]
    fn slot_leak_message() {
        let err = FrameError::SlotLeak { count: 2 };
        assert!(err.to_string().contains("2 saved material slot"));
    }
}
