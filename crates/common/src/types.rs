use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};
use uuid::Uuid;

/// Stable identity of a node in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Local-to-parent matrix (scale, then rotate, then translate).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Number of independent layer channels in a [`Layers`] mask.
pub const MAX_LAYERS: u8 = 32;

/// A 32-channel membership mask.
///
/// A fresh mask has channel 0 enabled. Two masks "test" positive when they
/// share at least one channel. Mutators ignore channels outside `0..32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layers(u32);

impl Default for Layers {
    fn default() -> Self {
        Self(1)
    }
}

impl Layers {
    /// A mask with no channel enabled.
    pub const NONE: Layers = Layers(0);

    /// A mask with only `channel` enabled, or `None` when out of range.
    pub fn channel(channel: u8) -> Option<Self> {
        (channel < MAX_LAYERS).then(|| Self(1 << channel))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Enable only `channel`.
    pub fn set(&mut self, channel: u8) {
        if let Some(mask) = Self::channel(channel) {
            *self = mask;
        }
    }

    pub fn enable(&mut self, channel: u8) {
        if let Some(mask) = Self::channel(channel) {
            self.0 |= mask.0;
        }
    }

    pub fn disable(&mut self, channel: u8) {
        if let Some(mask) = Self::channel(channel) {
            self.0 &= !mask.0;
        }
    }

    pub fn toggle(&mut self, channel: u8) {
        if let Some(mask) = Self::channel(channel) {
            self.0 ^= mask.0;
        }
    }

    pub fn is_enabled(&self, channel: u8) -> bool {
        Self::channel(channel).is_some_and(|mask| self.0 & mask.0 != 0)
    }

    /// True when `self` and `other` share at least one channel.
    pub fn test(&self, other: Layers) -> bool {
        self.0 & other.0 != 0
    }
}

/// Linear RGBA color with f32 channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Relative luminance with Rec. 709 weights.
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    /// Multiply every channel, alpha included.
    pub fn scale(&self, factor: f32) -> Self {
        Self::rgba(
            self.r * factor,
            self.g * factor,
            self.b * factor,
            self.a * factor,
        )
    }

    /// Multiply RGB by `factor`, leaving alpha untouched.
    pub fn scale_rgb(&self, factor: f32) -> Self {
        Self::rgba(self.r * factor, self.g * factor, self.b * factor, self.a)
    }

    /// Component-wise RGB product; alpha taken from `self`.
    pub fn modulate(&self, other: Color) -> Self {
        Self::rgba(self.r * other.r, self.g * other.g, self.b * other.b, self.a)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Add for Color {
    type Output = Color;

    fn add(self, rhs: Color) -> Color {
        Color::rgba(
            self.r + rhs.r,
            self.g + rhs.g,
            self.b + rhs.b,
            self.a + rhs.a,
        )
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, rhs: f32) -> Color {
        self.scale(rhs)
    }
}

/// Viewport dimensions in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A viewport with a zero dimension cannot back a render target.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_uniqueness() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn layers_default_is_channel_zero() {
        let layers = Layers::default();
        assert!(layers.is_enabled(0));
        assert!(!layers.is_enabled(1));
    }

    #[test]
    fn layers_toggle_and_test() {
        let bloom = Layers::channel(1).unwrap();
        let mut layers = Layers::default();
        assert!(!layers.test(bloom));

        layers.toggle(1);
        assert!(layers.test(bloom));
        assert!(layers.is_enabled(0));

        layers.toggle(1);
        assert!(!layers.test(bloom));
    }

    #[test]
    fn layers_out_of_range_is_ignored() {
        assert!(Layers::channel(MAX_LAYERS).is_none());
        let mut layers = Layers::default();
        layers.toggle(40);
        layers.set(32);
        assert_eq!(layers, Layers::default());
        assert!(!layers.is_enabled(40));
    }

    #[test]
    fn layers_set_replaces_mask() {
        let mut layers = Layers::default();
        layers.enable(3);
        layers.set(5);
        assert_eq!(layers.bits(), 1 << 5);
        layers.disable(5);
        assert_eq!(layers, Layers::NONE);
    }

    #[test]
    fn color_luminance_weights() {
        assert_eq!(Color::BLACK.luminance(), 0.0);
        assert!((Color::WHITE.luminance() - 1.0).abs() < 1e-6);
        assert!((Color::rgb(0.0, 1.0, 0.0).luminance() - 0.7152).abs() < 1e-6);
    }

    #[test]
    fn color_arithmetic() {
        let c = Color::rgb(0.25, 0.5, 1.0) + Color::rgba(0.25, 0.0, 0.0, 0.0);
        assert_eq!(c, Color::rgb(0.5, 0.5, 1.0));
        assert_eq!(c * 2.0, Color::rgba(1.0, 1.0, 2.0, 2.0));
        assert_eq!(c.scale_rgb(0.0), Color::rgba(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn viewport_empty_and_aspect() {
        assert!(Viewport::new(0, 10).is_empty());
        assert!(Viewport::new(10, 0).is_empty());
        assert_eq!(Viewport::new(0, 0).aspect(), 1.0);
        assert_eq!(Viewport::new(200, 100).aspect(), 2.0);
        assert_eq!(Viewport::new(4, 3).pixel_count(), 12);
        assert_eq!(Viewport::new(4, 3).to_string(), "4x3");
    }
}
