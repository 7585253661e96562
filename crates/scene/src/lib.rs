//! Scene graph: the drawable collaborator the compositor reads every frame.
//!
//! # Invariants
//! - Nodes are owned by the [`Scene`]; callers refer to them by [`NodeId`].
//! - Every node is either a mesh (has a material) or a group (does not).
//! - Layer tags are assigned at assembly time; nothing in the render loop
//!   adds or removes them.

mod camera;
mod geometry;
mod graph;
mod material;

pub use afterglow_common::{Color, Layers, NodeId, Transform, Viewport};
pub use camera::Camera;
pub use geometry::{Geometry, GeometryError};
pub use graph::{Mesh, Node, NodeKind, NodeVisitor, Scene, SceneError};
pub use material::{Material, MaterialRef};

pub fn crate_info() -> &'static str {
    "afterglow-scene v0.1.0"
}
