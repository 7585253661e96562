use afterglow_common::Color;
use std::sync::Arc;

/// Shared handle to a material. Many meshes may point at one material.
pub type MaterialRef = Arc<Material>;

/// Surface description used by the renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Base color, modulated by lighting unless `unlit` is set.
    pub color: Color,
    /// Added on top of the shaded color; unaffected by lighting.
    pub emissive: Color,
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".into(),
            color: Color::rgb(0.8, 0.8, 0.8),
            emissive: Color::TRANSPARENT,
            unlit: false,
        }
    }
}

impl Material {
    /// Lit material with the given base color.
    pub fn lit(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
            ..Self::default()
        }
    }

    /// Unlit material that renders as a single flat color.
    pub fn flat(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
            emissive: Color::TRANSPARENT,
            unlit: true,
        }
    }

    pub fn with_emissive(mut self, emissive: Color) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn into_ref(self) -> MaterialRef {
        Arc::new(self)
    }
}
