use afterglow_common::Layers;
use afterglow_scene::Node;

/// Layer channel that marks a node as part of the bloom set.
pub const BLOOM_LAYER: u8 = 1;

/// Read-only glow query over node layer masks.
///
/// Tags are written by whoever assembles the scene; this type only reads
/// them, once per node per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagStore {
    bloom_layer: Layers,
}

impl Default for TagStore {
    fn default() -> Self {
        Self {
            bloom_layer: Layers::channel(BLOOM_LAYER).unwrap_or(Layers::NONE),
        }
    }
}

impl TagStore {
    /// Glow set keyed on a different layer channel. `None` when the channel
    /// does not exist.
    pub fn for_channel(channel: u8) -> Option<Self> {
        Layers::channel(channel).map(|bloom_layer| Self { bloom_layer })
    }

    pub fn bloom_layer(&self) -> Layers {
        self.bloom_layer
    }

    pub fn is_glowing(&self, node: &Node) -> bool {
        node.layers.test(self.bloom_layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_common::{Color, Transform};
    use afterglow_scene::{Geometry, Material, Scene};
    use std::sync::Arc;

    #[test]
    fn default_channel_is_bloom_layer() {
        assert_eq!(TagStore::default().bloom_layer(), Layers::channel(BLOOM_LAYER).unwrap());
        assert!(TagStore::for_channel(32).is_none());
    }

    #[test]
    fn glow_follows_layer_toggle() {
        let mut scene = Scene::new();
        let id = scene
            .add_mesh(
                "m",
                Transform::default(),
                Arc::new(Geometry::cube(1.0)),
                Material::lit("m", Color::WHITE).into_ref(),
                None,
            )
            .unwrap();
        let tags = TagStore::default();
        assert!(!tags.is_glowing(scene.get(id).unwrap()));

        scene.get_mut(id).unwrap().layers.toggle(BLOOM_LAYER);
        assert!(tags.is_glowing(scene.get(id).unwrap()));
        assert!(!TagStore::for_channel(2).unwrap().is_glowing(scene.get(id).unwrap()));
    }
}
