use crate::geometry::Geometry;
use crate::material::MaterialRef;
use afterglow_common::{Color, Layers, NodeId, Transform};
use glam::Mat4;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Errors from structural scene edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("parent node {0:?} does not exist")]
    UnknownParent(NodeId),
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
}

/// Drawable payload of a mesh node.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: MaterialRef,
}

/// The closed set of node variants.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh(Mesh),
    /// Transform-only node; never carries a material.
    Group,
}

/// Double dispatch over [`NodeKind`] for full-scene passes.
pub trait NodeVisitor {
    fn visit_mesh(&mut self, node: &mut Node);

    fn visit_group(&mut self, _node: &mut Node) {}
}

/// A node in the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    pub name: String,
    pub transform: Transform,
    pub layers: Layers,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn layers_mut(&mut self) -> &mut Layers {
        &mut self.layers
    }

    /// Only mesh nodes carry a material.
    pub fn has_material(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn material(&self) -> Option<&MaterialRef> {
        self.mesh().map(|mesh| &mesh.material)
    }

    /// Swap in a new material and return the previous one. Group nodes are
    /// left untouched and return `None`.
    pub fn set_material(&mut self, material: MaterialRef) -> Option<MaterialRef> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(std::mem::replace(&mut mesh.material, material)),
            NodeKind::Group => None,
        }
    }
}

/// Scene graph of mesh and group nodes.
///
/// Nodes live in a `BTreeMap` keyed by id so full traversals are
/// deterministic; parent/child links are kept consistent by the structural
/// operations.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: BTreeMap<NodeId, Node>,
    roots: Vec<NodeId>,
    pub background: Color,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background(background: Color) -> Self {
        Self {
            background,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.values().filter(|n| n.has_material()).count()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        self.insert(name.into(), transform, parent, NodeKind::Group)
    }

    pub fn add_mesh(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        geometry: Arc<Geometry>,
        material: MaterialRef,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        self.insert(
            name.into(),
            transform,
            parent,
            NodeKind::Mesh(Mesh { geometry, material }),
        )
    }

    fn insert(
        &mut self,
        name: String,
        transform: Transform,
        parent: Option<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, SceneError> {
        let id = NodeId::new();
        match parent {
            Some(parent_id) => self
                .nodes
                .get_mut(&parent_id)
                .ok_or(SceneError::UnknownParent(parent_id))?
                .children
                .push(id),
            None => self.roots.push(id),
        }
        self.nodes.insert(
            id,
            Node {
                id,
                name,
                transform,
                layers: Layers::default(),
                parent,
                children: Vec::new(),
                kind,
            },
        );
        Ok(id)
    }

    /// Remove a node together with its subtree. Returns how many nodes were
    /// removed.
    pub fn remove(&mut self, id: NodeId) -> Result<usize, SceneError> {
        let parent = self.nodes.get(&id).ok_or(SceneError::UnknownNode(id))?.parent;
        match parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node_id in &doomed {
            self.nodes.remove(node_id);
        }
        tracing::debug!(node = %id.short(), removed = doomed.len(), "removed subtree");
        Ok(doomed.len())
    }

    /// Every node below `id`, depth-first. Empty for unknown ids.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// First node with `name` in depth-first order.
    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        let mut found = None;
        self.traverse(|node, _| {
            if found.is_none() && node.name == name {
                found = Some(node.id);
            }
        });
        found.and_then(|id| self.nodes.get(&id))
    }

    /// Accumulated local-to-world matrix of a node.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent_id) = node.parent {
            node = self.nodes.get(&parent_id)?;
            matrix = node.transform.matrix() * matrix;
        }
        Some(matrix)
    }

    /// Depth-first visit from the roots in insertion order, passing each
    /// node's world matrix.
    pub fn traverse<F: FnMut(&Node, Mat4)>(&self, mut f: F) {
        for root in &self.roots {
            self.traverse_from(*root, Mat4::IDENTITY, &mut f);
        }
    }

    fn traverse_from<F: FnMut(&Node, Mat4)>(&self, id: NodeId, parent: Mat4, f: &mut F) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let world = parent * node.transform.matrix();
        f(node, world);
        for child in &node.children {
            self.traverse_from(*child, world, f);
        }
    }

    /// Visit every node exactly once, in id order. Structure cannot change
    /// during the visit; only per-node state such as materials.
    pub fn traverse_mut<F: FnMut(&mut Node)>(&mut self, mut f: F) {
        for node in self.nodes.values_mut() {
            f(node);
        }
    }

    /// Dispatch every node to `visitor` by variant, in id order.
    pub fn visit_mut<V: NodeVisitor + ?Sized>(&mut self, visitor: &mut V) {
        for node in self.nodes.values_mut() {
            if node.has_material() {
                visitor.visit_mesh(node);
            } else {
                visitor.visit_group(node);
            }
        }
    }

    /// Toggle `channel` on every node called `name`. Returns the count.
    pub fn toggle_layer_named(&mut self, name: &str, channel: u8) -> usize {
        let mut touched = 0;
        self.traverse_mut(|node| {
            if node.name == name {
                node.layers.toggle(channel);
                touched += 1;
            }
        });
        tracing::debug!(name, channel, touched, "toggled layer by name");
        touched
    }

    /// Toggle `channel` on every mesh in the subtree rooted at `root`
    /// (including `root` itself). Group nodes are skipped.
    pub fn toggle_layer_meshes_under(
        &mut self,
        root: NodeId,
        channel: u8,
    ) -> Result<usize, SceneError> {
        if !self.nodes.contains_key(&root) {
            return Err(SceneError::UnknownNode(root));
        }
        let mut targets = self.descendants(root);
        targets.push(root);

        let mut touched = 0;
        for id in targets {
            if let Some(node) = self.nodes.get_mut(&id).filter(|n| n.has_material()) {
                node.layers.toggle(channel);
                touched += 1;
            }
        }
        tracing::debug!(root = %root.short(), channel, touched, "toggled layer on meshes");
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use glam::Vec3;

    fn cube() -> Arc<Geometry> {
        Arc::new(Geometry::cube(1.0))
    }

    fn grey() -> MaterialRef {
        Material::lit("grey", Color::rgb(0.5, 0.5, 0.5)).into_ref()
    }

    #[test]
    fn add_mesh_and_group() {
        let mut scene = Scene::new();
        let group = scene.add_group("model", Transform::default(), None).unwrap();
        let mesh = scene
            .add_mesh("Sphere_3", Transform::default(), cube(), grey(), Some(group))
            .unwrap();

        assert_eq!(scene.len(), 2);
        assert_eq!(scene.mesh_count(), 1);
        assert_eq!(scene.roots(), &[group]);
        assert_eq!(scene.get(group).unwrap().children(), &[mesh]);
        assert_eq!(scene.get(mesh).unwrap().parent(), Some(group));
        assert!(!scene.get(group).unwrap().has_material());
        assert!(scene.get(mesh).unwrap().has_material());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut scene = Scene::new();
        let ghost = NodeId::new();
        let err = scene
            .add_group("orphan", Transform::default(), Some(ghost))
            .unwrap_err();
        assert_eq!(err, SceneError::UnknownParent(ghost));
        assert!(scene.is_empty());
    }

    #[test]
    fn set_material_on_group_is_noop() {
        let mut scene = Scene::new();
        let group = scene.add_group("g", Transform::default(), None).unwrap();
        let node = scene.get_mut(group).unwrap();
        assert!(node.set_material(grey()).is_none());
        assert!(node.material().is_none());
    }

    #[test]
    fn set_material_returns_previous() {
        let mut scene = Scene::new();
        let original = grey();
        let id = scene
            .add_mesh("m", Transform::default(), cube(), original.clone(), None)
            .unwrap();
        let replacement = Material::flat("black", Color::BLACK).into_ref();
        let previous = scene.get_mut(id).unwrap().set_material(replacement.clone());
        assert!(Arc::ptr_eq(&previous.unwrap(), &original));
        assert!(Arc::ptr_eq(scene.get(id).unwrap().material().unwrap(), &replacement));
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let group = scene
            .add_group("g", Transform::from_position(Vec3::new(0.0, 1.0, 0.0)), None)
            .unwrap();
        let mesh = scene
            .add_mesh(
                "m",
                Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
                cube(),
                grey(),
                Some(group),
            )
            .unwrap();
        let world = scene.world_matrix(mesh).unwrap();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(2.0, 1.0, 0.0));

        let mut seen = None;
        scene.traverse(|node, m| {
            if node.id() == mesh {
                seen = Some(m);
            }
        });
        assert_eq!(seen, Some(world));
    }

    #[test]
    fn traverse_is_depth_first_in_insertion_order() {
        let mut scene = Scene::new();
        let a = scene.add_group("a", Transform::default(), None).unwrap();
        scene.add_group("a1", Transform::default(), Some(a)).unwrap();
        scene.add_group("b", Transform::default(), None).unwrap();
        scene.add_group("a2", Transform::default(), Some(a)).unwrap();

        let mut names = Vec::new();
        scene.traverse(|node, _| names.push(node.name.clone()));
        assert_eq!(names, ["a", "a1", "a2", "b"]);
    }

    #[test]
    fn traverse_mut_visits_every_node_once() {
        let mut scene = Scene::new();
        let a = scene.add_group("a", Transform::default(), None).unwrap();
        scene.add_mesh("m", Transform::default(), cube(), grey(), Some(a)).unwrap();
        scene.add_group("b", Transform::default(), None).unwrap();

        let mut count = 0;
        scene.traverse_mut(|_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn visit_mut_dispatches_by_variant() {
        struct Counter {
            meshes: usize,
            groups: usize,
        }
        impl NodeVisitor for Counter {
            fn visit_mesh(&mut self, _node: &mut Node) {
                self.meshes += 1;
            }
            fn visit_group(&mut self, _node: &mut Node) {
                self.groups += 1;
            }
        }

        let mut scene = Scene::new();
        let g = scene.add_group("g", Transform::default(), None).unwrap();
        scene.add_mesh("m1", Transform::default(), cube(), grey(), Some(g)).unwrap();
        scene.add_mesh("m2", Transform::default(), cube(), grey(), None).unwrap();

        let mut counter = Counter { meshes: 0, groups: 0 };
        scene.visit_mut(&mut counter);
        assert_eq!(counter.meshes, 2);
        assert_eq!(counter.groups, 1);
    }

    #[test]
    fn remove_drops_subtree() {
        let mut scene = Scene::new();
        let a = scene.add_group("a", Transform::default(), None).unwrap();
        let child = scene.add_group("a1", Transform::default(), Some(a)).unwrap();
        scene.add_mesh("leaf", Transform::default(), cube(), grey(), Some(child)).unwrap();
        let b = scene.add_group("b", Transform::default(), None).unwrap();

        assert_eq!(scene.remove(a).unwrap(), 3);
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.roots(), &[b]);
        assert_eq!(scene.remove(a), Err(SceneError::UnknownNode(a)));
    }

    #[test]
    fn find_by_name_and_descendants() {
        let mut scene = Scene::new();
        let a = scene.add_group("a", Transform::default(), None).unwrap();
        let m = scene.add_mesh("target", Transform::default(), cube(), grey(), Some(a)).unwrap();
        assert_eq!(scene.find_by_name("target").map(Node::id), Some(m));
        assert!(scene.find_by_name("missing").is_none());
        assert_eq!(scene.descendants(a), vec![m]);
        assert!(scene.descendants(NodeId::new()).is_empty());
    }

    #[test]
    fn toggle_layer_named_hits_all_matches() {
        let mut scene = Scene::new();
        let a = scene.add_mesh("Sphere_3", Transform::default(), cube(), grey(), None).unwrap();
        let b = scene.add_mesh("Sphere_3", Transform::default(), cube(), grey(), None).unwrap();
        let c = scene.add_mesh("Sphere_1", Transform::default(), cube(), grey(), None).unwrap();

        assert_eq!(scene.toggle_layer_named("Sphere_3", 1), 2);
        assert!(scene.get(a).unwrap().layers.is_enabled(1));
        assert!(scene.get(b).unwrap().layers.is_enabled(1));
        assert!(!scene.get(c).unwrap().layers.is_enabled(1));
    }

    #[test]
    fn toggle_layer_meshes_under_skips_groups() {
        let mut scene = Scene::new();
        let root = scene.add_group("model", Transform::default(), None).unwrap();
        let inner = scene.add_group("inner", Transform::default(), Some(root)).unwrap();
        let m1 = scene.add_mesh("m1", Transform::default(), cube(), grey(), Some(root)).unwrap();
        let m2 = scene.add_mesh("m2", Transform::default(), cube(), grey(), Some(inner)).unwrap();

        assert_eq!(scene.toggle_layer_meshes_under(root, 1).unwrap(), 2);
        assert!(!scene.get(root).unwrap().layers.is_enabled(1));
        assert!(!scene.get(inner).unwrap().layers.is_enabled(1));
        assert!(scene.get(m1).unwrap().layers.is_enabled(1));
        assert!(scene.get(m2).unwrap().layers.is_enabled(1));

        let ghost = NodeId::new();
        assert_eq!(
            scene.toggle_layer_meshes_under(ghost, 1),
            Err(SceneError::UnknownNode(ghost))
        );
    }
}
