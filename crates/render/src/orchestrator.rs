//! Per-tick driver of the selective bloom pipeline.
//!
//! # Invariants
//! - States advance strictly in order within one tick, and a tick finishes
//!   before the next begins (`frame` holds `&mut Scene` for its duration).
//! - Restoring runs on every path out of BloomRendering.
//! - The material slot table is empty whenever the state is `Idle`.
//! - Targets are only (re)created between ticks, before Suppressing.

use crate::backend::{RenderBackend, ScenePass};
use crate::bloom_pass::BloomPass;
use crate::composite::CompositeShader;
use crate::error::{FrameError, RenderError};
use crate::material_override::{MaterialOverride, MaterialSlots};
use crate::params::BloomParameters;
use crate::tags::TagStore;
use afterglow_common::Viewport;
use afterglow_scene::{Camera, Scene};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    Idle,
    Suppressing,
    BloomRendering,
    Restoring,
    BaseRendering,
    Compositing,
    Presented,
}

impl FrameState {
    /// Successor on the success path.
    pub fn next(self) -> FrameState {
        match self {
            FrameState::Idle => FrameState::Suppressing,
            FrameState::Suppressing => FrameState::BloomRendering,
            FrameState::BloomRendering => FrameState::Restoring,
            FrameState::Restoring => FrameState::BaseRendering,
            FrameState::BaseRendering => FrameState::Compositing,
            FrameState::Compositing => FrameState::Presented,
            FrameState::Presented => FrameState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub suppressed: usize,
    pub restored: usize,
    pub glowing: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Presented(FrameStats),
    /// Targets could not be acquired; nothing was drawn. Retried next tick.
    Skipped(RenderError),
    /// A pass failed after acquisition. Materials were still restored.
    Dropped(RenderError),
}

impl FrameOutcome {
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented(_))
    }
}

pub struct FrameOrchestrator<B: RenderBackend> {
    backend: B,
    params: BloomParameters,
    bloom: BloomPass,
    composite: CompositeShader,
    over: MaterialOverride,
    pending: Option<Viewport>,
    viewport: Option<Viewport>,
    state: FrameState,
    trace: Vec<FrameState>,
    frame: u64,
    presented: u64,
}

impl<B: RenderBackend> FrameOrchestrator<B> {
    /// `viewport` is treated as a pending resize, so targets are acquired
    /// at the start of the first tick.
    pub fn new(backend: B, params: BloomParameters, tags: TagStore, viewport: Viewport) -> Self {
        tracing::info!(
            backend = backend.name(),
            %viewport,
            threshold = params.threshold(),
            strength = params.strength(),
            radius = params.radius(),
            "frame orchestrator created"
        );
        Self {
            bloom: BloomPass::new(&params),
            backend,
            params,
            composite: CompositeShader::default(),
            over: MaterialOverride::new(tags),
            pending: Some(viewport),
            viewport: None,
            state: FrameState::Idle,
            trace: Vec::with_capacity(8),
            frame: 0,
            presented: 0,
        }
    }

    /// Record a new viewport. Targets are recreated before the next
    /// Suppressing state, never mid-pass.
    pub fn resize(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        tracing::debug!(%viewport, "resize queued");
        self.pending = Some(viewport);
    }

    /// Run one tick.
    ///
    /// Acquisition and render failures are reported in the outcome. A slot
    /// table left non-empty by earlier misuse is an error and the tick does
    /// not run.
    pub fn frame(&mut self, scene: &mut Scene, camera: &Camera) -> Result<FrameOutcome, FrameError> {
        self.frame += 1;
        let span = tracing::info_span!("frame", frame = self.frame);
        let _enter = span.enter();
        self.trace.clear();

        if !self.over.slots().is_empty() {
            let count = self.over.slots().len();
            tracing::error!(count, "material slots survived a frame boundary");
            return Err(FrameError::SlotLeak { count });
        }

        if let Err(err) = self.prepare_targets() {
            tracing::warn!(error = %err, "frame skipped");
            self.enter(FrameState::Idle);
            return Ok(FrameOutcome::Skipped(err));
        }

        let start = Instant::now();
        let Self {
            bloom,
            over,
            backend,
            state,
            trace,
            ..
        } = self;
        let report = bloom.run(over, backend, scene, camera, |next| {
            record(state, trace, next);
        });
        if let Err(err) = report.result {
            return Ok(self.drop_frame(err));
        }

        self.enter(FrameState::BaseRendering);
        if let Err(err) = self.backend.draw_scene(scene, camera, ScenePass::Base) {
            return Ok(self.drop_frame(err));
        }

        self.enter(FrameState::Compositing);
        let shown = self
            .backend
            .composite(&self.composite)
            .and_then(|()| self.backend.present(self.params.exposure()));
        if let Err(err) = shown {
            return Ok(self.drop_frame(err));
        }

        self.enter(FrameState::Presented);
        self.presented += 1;
        let stats = FrameStats {
            frame: self.frame,
            suppressed: report.stats.suppressed,
            restored: report.stats.restored,
            glowing: report.stats.glowing,
            elapsed: start.elapsed(),
        };
        self.enter(FrameState::Idle);
        tracing::debug!(
            suppressed = stats.suppressed,
            glowing = stats.glowing,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "frame presented"
        );
        Ok(FrameOutcome::Presented(stats))
    }

    fn prepare_targets(&mut self) -> Result<(), RenderError> {
        if let Some(viewport) = self.pending {
            self.backend.acquire_targets(viewport)?;
            self.pending = None;
            self.viewport = Some(viewport);
            tracing::info!(%viewport, "render targets acquired");
        }
        if !self.backend.has_targets() {
            return Err(RenderError::TargetsMissing);
        }
        Ok(())
    }

    fn drop_frame(&mut self, err: RenderError) -> FrameOutcome {
        if matches!(err, RenderError::DeviceLost(_)) && self.pending.is_none() {
            self.pending = self.viewport;
        }
        tracing::warn!(error = %err, state = ?self.state, "frame dropped");
        self.enter(FrameState::Idle);
        FrameOutcome::Dropped(err)
    }

    fn enter(&mut self, next: FrameState) {
        record(&mut self.state, &mut self.trace, next);
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// States entered during the most recent tick.
    pub fn last_trace(&self) -> &[FrameState] {
        &self.trace
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn pending_viewport(&self) -> Option<Viewport> {
        self.pending
    }

    pub fn slots(&self) -> &MaterialSlots {
        self.over.slots()
    }

    pub fn material_override_mut(&mut self) -> &mut MaterialOverride {
        &mut self.over
    }

    pub fn params(&self) -> &BloomParameters {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn record(state: &mut FrameState, trace: &mut Vec<FrameState>, next: FrameState) {
    tracing::trace!(from = ?*state, to = ?next, "state");
    *state = next;
    trace.push(next);
}
