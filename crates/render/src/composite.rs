use crate::error::RenderError;
use crate::target::RenderTarget;

/// Additive blend of the blurred bloom buffer onto the base image.
///
/// `output = base + bloom_factor * bloom`. Bloom strength is already baked
/// into the bloom buffer by the bright pass, so the factor defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeShader {
    pub bloom_factor: f32,
}

impl Default for CompositeShader {
    fn default() -> Self {
        Self { bloom_factor: 1.0 }
    }
}

impl CompositeShader {
    pub fn apply(
        &self,
        base: &RenderTarget,
        bloom: &RenderTarget,
        out: &mut RenderTarget,
    ) -> Result<(), RenderError> {
        base.ensure_same_size(bloom)?;
        base.ensure_same_size(out)?;
        for ((dst, b), g) in out
            .pixels_mut()
            .iter_mut()
            .zip(base.pixels())
            .zip(bloom.pixels())
        {
            *dst = *b + *g * self.bloom_factor;
        }
        Ok(())
    }
}
