//! Frame-local material swapping for the bloom pass.
//!
//! # Invariants
//! - A slot exists for a node only between its `suppress` and `restore`.
//! - A saved slot always holds the node's original material, never the
//!   suppressor.
//! - [`Suppression`] restores every slot when it goes out of scope, so the
//!   slot table is empty again once the bloom pass is over.

use crate::tags::TagStore;
use afterglow_common::{Color, NodeId};
use afterglow_scene::{Material, MaterialRef, Node, NodeVisitor, Scene};
use std::collections::HashMap;
use std::ops::Deref;

/// Saved original materials, keyed by node identity.
///
/// Lives only for one bloom sub-pass. Capacity is kept between frames.
#[derive(Debug, Default)]
pub struct MaterialSlots {
    saved: HashMap<NodeId, MaterialRef>,
}

impl MaterialSlots {
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.saved.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&MaterialRef> {
        self.saved.get(&id)
    }
}

/// Counts from one suppress/restore cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStats {
    /// Meshes whose material was replaced by the suppressor.
    pub suppressed: usize,
    /// Meshes whose original material was put back.
    pub restored: usize,
    /// Meshes left untouched because they glow.
    pub glowing: usize,
}

/// Swaps non-glowing meshes to a flat suppressor material and back.
#[derive(Debug)]
pub struct MaterialOverride {
    tags: TagStore,
    suppressor: MaterialRef,
    slots: MaterialSlots,
}

impl MaterialOverride {
    pub const SUPPRESSOR_NAME: &'static str = "bloom-suppressor";

    /// Override with the default unlit black suppressor.
    pub fn new(tags: TagStore) -> Self {
        Self::with_suppressor(tags, Material::flat(Self::SUPPRESSOR_NAME, Color::BLACK).into_ref())
    }

    pub fn with_suppressor(tags: TagStore, suppressor: MaterialRef) -> Self {
        Self {
            tags,
            suppressor,
            slots: MaterialSlots::default(),
        }
    }

    pub fn tags(&self) -> TagStore {
        self.tags
    }

    pub fn suppressor(&self) -> &MaterialRef {
        &self.suppressor
    }

    pub fn slots(&self) -> &MaterialSlots {
        &self.slots
    }

    /// Replace the material of a non-glowing mesh with the suppressor.
    ///
    /// Group nodes, glowing meshes and already suppressed meshes are left
    /// alone. Returns whether a swap happened.
    pub fn suppress(&mut self, node: &mut Node) -> bool {
        if !node.has_material() || self.tags.is_glowing(node) || self.slots.contains(node.id()) {
            return false;
        }
        match node.set_material(self.suppressor.clone()) {
            Some(original) => {
                self.slots.saved.insert(node.id(), original);
                true
            }
            None => false,
        }
    }

    /// Put back the saved material, if any. Returns whether a swap happened.
    pub fn restore(&mut self, node: &mut Node) -> bool {
        match self.slots.saved.remove(&node.id()) {
            Some(original) => {
                node.set_material(original);
                true
            }
            None => false,
        }
    }

    /// Suppress every eligible mesh in `scene`. The returned guard gives
    /// read access to the suppressed scene and restores it on drop.
    pub fn suppress_scene<'a>(&'a mut self, scene: &'a mut Scene) -> Suppression<'a> {
        let mut visitor = SuppressVisitor {
            over: &mut *self,
            stats: SwapStats::default(),
        };
        scene.visit_mut(&mut visitor);
        let stats = visitor.stats;
        tracing::trace!(
            suppressed = stats.suppressed,
            glowing = stats.glowing,
            "scene suppressed"
        );
        Suppression {
            scene,
            over: self,
            stats,
            finished: false,
        }
    }
}

struct SuppressVisitor<'a> {
    over: &'a mut MaterialOverride,
    stats: SwapStats,
}

impl NodeVisitor for SuppressVisitor<'_> {
    fn visit_mesh(&mut self, node: &mut Node) {
        if self.over.tags.is_glowing(node) {
            self.stats.glowing += 1;
        } else if self.over.suppress(node) {
            self.stats.suppressed += 1;
        }
    }
}

struct RestoreVisitor<'a> {
    over: &'a mut MaterialOverride,
    restored: usize,
}

impl NodeVisitor for RestoreVisitor<'_> {
    fn visit_mesh(&mut self, node: &mut Node) {
        if self.over.restore(node) {
            self.restored += 1;
        }
    }
}

/// A scene whose non-glowing meshes currently carry the suppressor.
///
/// Derefs to the scene for rendering. Dropping the guard, on any path,
/// restores the original materials.
pub struct Suppression<'a> {
    scene: &'a mut Scene,
    over: &'a mut MaterialOverride,
    stats: SwapStats,
    finished: bool,
}

impl Suppression<'_> {
    pub fn stats(&self) -> SwapStats {
        self.stats
    }

    /// Restore now and report the full cycle.
    pub fn finish(mut self) -> SwapStats {
        self.restore_all();
        self.stats
    }

    fn restore_all(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut visitor = RestoreVisitor {
            over: &mut *self.over,
            restored: 0,
        };
        self.scene.visit_mut(&mut visitor);
        self.stats.restored = visitor.restored;

        if !self.over.slots.is_empty() {
            tracing::error!(
                leaked = self.over.slots.len(),
                "material slots left after restore"
            );
        }
    }
}

impl Deref for Suppression<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        &*self.scene
    }
}

impl Drop for Suppression<'_> {
    fn drop(&mut self) {
        self.restore_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::BLOOM_LAYER;
    use afterglow_common::Transform;
    use afterglow_scene::Geometry;
    use std::sync::Arc;

    struct Fixture {
        scene: Scene,
        group: NodeId,
        plain: NodeId,
        glowing: NodeId,
        plain_material: MaterialRef,
        glow_material: MaterialRef,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let cube = Arc::new(Geometry::cube(1.0));
        let plain_material = Material::lit("plain", Color::rgb(0.2, 0.4, 0.6)).into_ref();
        let glow_material = Material::lit("glow", Color::WHITE).into_ref();

        let group = scene.add_group("model", Transform::default(), None).unwrap();
        let plain = scene
            .add_mesh("plain", Transform::default(), cube.clone(), plain_material.clone(), Some(group))
            .unwrap();
        let glowing = scene
            .add_mesh("glow", Transform::default(), cube, glow_material.clone(), Some(group))
            .unwrap();
        scene.get_mut(glowing).unwrap().layers.toggle(BLOOM_LAYER);

        Fixture {
            scene,
            group,
            plain,
            glowing,
            plain_material,
            glow_material,
        }
    }

    fn material_of(scene: &Scene, id: NodeId) -> MaterialRef {
        scene.get(id).unwrap().material().unwrap().clone()
    }

    #[test]
    fn suppress_swaps_only_non_glowing_meshes() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());

        assert!(over.suppress(f.scene.get_mut(f.plain).unwrap()));
        assert!(!over.suppress(f.scene.get_mut(f.glowing).unwrap()));
        assert!(!over.suppress(f.scene.get_mut(f.group).unwrap()));

        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), over.suppressor()));
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.glowing), &f.glow_material));
        assert_eq!(over.slots().len(), 1);
    }

    #[test]
    fn repeated_suppress_keeps_original() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());
        let node = f.scene.get_mut(f.plain).unwrap();

        assert!(over.suppress(node));
        assert!(!over.suppress(node));
        assert!(Arc::ptr_eq(over.slots().get(f.plain).unwrap(), &f.plain_material));

        assert!(over.restore(node));
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), &f.plain_material));
    }

    #[test]
    fn restore_twice_is_noop() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());
        let node = f.scene.get_mut(f.plain).unwrap();

        over.suppress(node);
        assert!(over.restore(node));
        assert!(!over.restore(node));
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), &f.plain_material));
        assert!(over.slots().is_empty());
    }

    #[test]
    fn restore_unknown_node_is_noop() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());
        assert!(!over.restore(f.scene.get_mut(f.glowing).unwrap()));
        assert!(!over.restore(f.scene.get_mut(f.group).unwrap()));
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.glowing), &f.glow_material));
    }

    #[test]
    fn suppression_guard_restores_on_finish() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());

        let guard = over.suppress_scene(&mut f.scene);
        assert_eq!(guard.stats().suppressed, 1);
        assert_eq!(guard.stats().glowing, 1);
        assert_eq!(guard.get(f.plain).unwrap().material().unwrap().name, MaterialOverride::SUPPRESSOR_NAME);

        let stats = guard.finish();
        assert_eq!(stats.restored, 1);
        assert!(over.slots().is_empty());
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), &f.plain_material));
    }

    #[test]
    fn suppression_guard_restores_on_drop() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());
        {
            let guard = over.suppress_scene(&mut f.scene);
            assert_eq!(guard.stats().suppressed, 1);
        }
        assert!(over.slots().is_empty());
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), &f.plain_material));
    }

    #[test]
    fn suppression_guard_restores_during_unwind() {
        let mut f = fixture();
        let mut over = MaterialOverride::new(TagStore::default());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = over.suppress_scene(&mut f.scene);
            panic!("render blew up");
        }));
        assert!(result.is_err());
        assert!(over.slots().is_empty());
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), &f.plain_material));
    }

    #[test]
    fn custom_suppressor_is_used() {
        let mut f = fixture();
        let grey = Material::flat("grey", Color::rgb(0.1, 0.1, 0.1)).into_ref();
        let mut over = MaterialOverride::with_suppressor(TagStore::default(), grey.clone());
        over.suppress(f.scene.get_mut(f.plain).unwrap());
        assert!(Arc::ptr_eq(&material_of(&f.scene, f.plain), &grey));
    }
}
