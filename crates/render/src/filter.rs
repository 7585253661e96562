//! Image-space bloom filters: bright pass and separable Gaussian blur.

use crate::error::RenderError;
use crate::params::BloomParameters;
use crate::target::RenderTarget;
use afterglow_common::Color;

/// Upper bound on blur half-width, in pixels.
pub const MAX_BLUR_TAPS: usize = 32;

/// Zeroes pixels below a luminance threshold and scales the rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightPass {
    pub threshold: f32,
    pub strength: f32,
}

impl BrightPass {
    pub fn apply_pixel(&self, color: Color) -> Color {
        if color.luminance() < self.threshold {
            Color::TRANSPARENT
        } else {
            color * self.strength
        }
    }

    pub fn apply(&self, target: &mut RenderTarget) {
        for px in target.pixels_mut() {
            *px = self.apply_pixel(*px);
        }
    }
}

/// Separable Gaussian blur with a precomputed kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBlur {
    /// Normalized weights for offsets `0..=half_width`.
    weights: Vec<f32>,
}

impl GaussianBlur {
    /// `radius` is the Gaussian sigma in pixels. Zero yields the identity.
    pub fn new(radius: f32) -> Self {
        if radius <= 0.0 {
            return Self { weights: vec![1.0] };
        }
        let half_width = ((radius * 3.0).ceil() as usize).clamp(1, MAX_BLUR_TAPS);
        let two_sigma_sq = 2.0 * radius * radius;
        let mut weights: Vec<f32> = (0..=half_width)
            .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
            .collect();
        let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        for w in &mut weights {
            *w /= total;
        }
        Self { weights }
    }

    pub fn half_width(&self) -> usize {
        self.weights.len() - 1
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Blur `src` horizontally into `scratch`, then vertically into `dst`.
    /// Edges clamp.
    pub fn apply(
        &self,
        src: &RenderTarget,
        scratch: &mut RenderTarget,
        dst: &mut RenderTarget,
    ) -> Result<(), RenderError> {
        src.ensure_same_size(scratch)?;
        src.ensure_same_size(dst)?;
        let viewport = src.viewport();
        let (w, h) = (viewport.width as usize, viewport.height as usize);

        pass(src.pixels(), scratch.pixels_mut(), w, h, &self.weights, Axis::Horizontal);
        pass(scratch.pixels(), dst.pixels_mut(), w, h, &self.weights, Axis::Vertical);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn pass(src: &[Color], dst: &mut [Color], w: usize, h: usize, weights: &[f32], axis: Axis) {
    let (len, stride) = match axis {
        Axis::Horizontal => (w, 1),
        Axis::Vertical => (h, w),
    };
    for y in 0..h {
        for x in 0..w {
            let pos = match axis {
                Axis::Horizontal => x,
                Axis::Vertical => y,
            };
            let origin = y * w + x - pos * stride;
            let sample = |p: usize| src[origin + p * stride];

            let mut acc = sample(pos) * weights[0];
            for (offset, weight) in weights.iter().enumerate().skip(1) {
                let lo = pos.saturating_sub(offset);
                let hi = (pos + offset).min(len - 1);
                acc = acc + (sample(lo) + sample(hi)) * *weight;
            }
            dst[y * w + x] = acc;
        }
    }
}

/// Bright pass plus blur, built once from the bloom parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter {
    pub bright: BrightPass,
    pub blur: GaussianBlur,
}

impl BloomFilter {
    pub fn new(params: &BloomParameters) -> Self {
        Self {
            bright: BrightPass {
                threshold: params.threshold(),
                strength: params.strength(),
            },
            blur: GaussianBlur::new(params.radius()),
        }
    }

    /// Threshold `bloom` in place, then blur it into `out`.
    pub fn apply(
        &self,
        bloom: &mut RenderTarget,
        scratch: &mut RenderTarget,
        out: &mut RenderTarget,
    ) -> Result<(), RenderError> {
        self.bright.apply(bloom);
        self.blur.apply(bloom, scratch, out)
    }
}
