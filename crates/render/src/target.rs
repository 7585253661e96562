use crate::error::RenderError;
use afterglow_common::{Color, Viewport};

/// Largest width or height accepted for an off-screen target.
pub const MAX_TARGET_DIMENSION: u32 = 16_384;

/// Off-screen color + depth buffer sized to a viewport.
///
/// Allocated once per viewport size; passes clear and reuse it.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    viewport: Viewport,
    color: Vec<Color>,
    depth: Vec<f32>,
}

fn reserve<T: Clone>(len: usize, fill: T) -> Result<Vec<T>, RenderError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| RenderError::Allocation {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    buf.resize(len, fill);
    Ok(buf)
}

impl RenderTarget {
    pub fn new(viewport: Viewport) -> Result<Self, RenderError> {
        if viewport.is_empty() {
            return Err(RenderError::EmptyViewport(viewport));
        }
        if viewport.width > MAX_TARGET_DIMENSION || viewport.height > MAX_TARGET_DIMENSION {
            return Err(RenderError::ViewportTooLarge {
                viewport,
                max: MAX_TARGET_DIMENSION,
            });
        }
        let len = viewport.pixel_count();
        Ok(Self {
            viewport,
            color: reserve(len, Color::TRANSPARENT)?,
            depth: reserve(len, f32::INFINITY)?,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clear(&mut self, color: Color) {
        self.color.fill(color);
        self.depth.fill(f32::INFINITY);
    }

    pub fn pixels(&self) -> &[Color] {
        &self.color
    }

    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.color
    }

    /// Color plane and depth plane together, for depth-tested writes.
    pub(crate) fn planes_mut(&mut self) -> (&mut [Color], &mut [f32]) {
        (&mut self.color, &mut self.depth)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.index(x, y).map(|i| self.color[i])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.color[i] = color;
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.viewport.width && y < self.viewport.height)
            .then(|| y as usize * self.viewport.width as usize + x as usize)
    }

    pub(crate) fn ensure_same_size(&self, other: &RenderTarget) -> Result<(), RenderError> {
        if self.viewport != other.viewport {
            return Err(RenderError::SizeMismatch {
                expected: self.viewport,
                actual: other.viewport,
            });
        }
        Ok(())
    }
}

/// Finished 8-bit RGBA image handed to the presentation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, top row first.
    pub data: Vec<u8>,
}

fn quantize(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl FrameImage {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            width: viewport.width,
            height: viewport.height,
            data: vec![0; viewport.pixel_count() * 4],
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    /// Overwrite with `source` scaled by `exposure`, clamped to [0, 1].
    /// Alpha is not exposed.
    pub fn write_from(&mut self, source: &RenderTarget, exposure: f32) {
        let viewport = source.viewport();
        if self.viewport() != viewport {
            *self = Self::new(viewport);
        }
        for (px, out) in source.pixels().iter().zip(self.data.chunks_exact_mut(4)) {
            out[0] = quantize(px.r * exposure);
            out[1] = quantize(px.g * exposure);
            out[2] = quantize(px.b * exposure);
            out[3] = quantize(px.a);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_viewport_is_rejected() {
        assert_eq!(
            RenderTarget::new(Viewport::new(0, 0)).unwrap_err(),
            RenderError::EmptyViewport(Viewport::new(0, 0))
        );
        assert!(RenderTarget::new(Viewport::new(16, 0)).is_err());
    }

    #[test]
    fn oversized_viewport_is_rejected() {
        let err = RenderTarget::new(Viewport::new(MAX_TARGET_DIMENSION + 1, 1)).unwrap_err();
        assert!(matches!(err, RenderError::ViewportTooLarge { .. }));
        assert!(err.is_resource_failure());
    }

    #[test]
    fn pixel_access_is_bounds_checked() {
        let mut target = RenderTarget::new(Viewport::new(4, 2)).unwrap();
        target.set_pixel(3, 1, Color::WHITE);
        target.set_pixel(4, 0, Color::WHITE);
        assert_eq!(target.pixel(3, 1), Some(Color::WHITE));
        assert_eq!(target.pixel(0, 0), Some(Color::TRANSPARENT));
        assert_eq!(target.pixel(4, 0), None);
    }

    #[test]
    fn clear_resets_color_and_depth() {
        let mut target = RenderTarget::new(Viewport::new(2, 2)).unwrap();
        target.planes_mut().1[0] = 0.5;
        target.clear(Color::rgb(0.1, 0.2, 0.3));
        assert!(target.pixels().iter().all(|c| *c == Color::rgb(0.1, 0.2, 0.3)));
        assert!(target.planes_mut().1.iter().all(|d| d.is_infinite()));
    }

    #[test]
    fn frame_image_applies_exposure_and_clamps() {
        let mut target = RenderTarget::new(Viewport::new(2, 1)).unwrap();
        target.set_pixel(0, 0, Color::rgb(0.5, 2.0, -1.0));
        target.set_pixel(1, 0, Color::rgb(0.25, 0.25, 0.25));

        let mut frame = FrameImage::new(Viewport::new(1, 1));
        frame.write_from(&target, 2.0);
        assert_eq!(frame.viewport(), Viewport::new(2, 1));
        assert_eq!(frame.pixel(0, 0), Some([255, 255, 0, 255]));
        assert_eq!(frame.pixel(1, 0), Some([128, 128, 128, 255]));
        assert!(frame.to_rgba_image().is_some());
    }
}
