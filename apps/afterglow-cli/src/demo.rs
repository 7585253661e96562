//! The demo scene: three small models stacked vertically.

use afterglow_common::{Color, Transform};
use afterglow_render::BLOOM_LAYER;
use afterglow_scene::{Camera, Geometry, Material, NodeId, Scene, SceneError};
use glam::Vec3;
use std::sync::Arc;

const SPHERE_COLORS: [Color; 3] = [
    Color::rgb(0.9, 0.2, 0.2),
    Color::rgb(0.2, 0.9, 0.3),
    Color::rgb(0.3, 0.5, 1.0),
];

/// Three spheres on a pedestal, grouped under one node at height `y`.
fn add_model(scene: &mut Scene, name: &str, y: f32) -> Result<NodeId, SceneError> {
    let sphere = Arc::new(Geometry::uv_sphere(0.3, 24, 16));
    let cube = Arc::new(Geometry::cube(1.0));
    let root = scene.add_group(name, Transform::from_position(Vec3::new(0.0, y, 0.0)), None)?;

    for (i, color) in SPHERE_COLORS.into_iter().enumerate() {
        let x = (i as f32 - 1.0) * 0.9;
        scene.add_mesh(
            format!("Sphere_{}", i + 1),
            Transform::from_position(Vec3::new(x, 0.1, 0.0)),
            sphere.clone(),
            Material::lit(format!("{name}_sphere_{}", i + 1), color).into_ref(),
            Some(root),
        )?;
    }
    scene.add_mesh(
        "Pedestal",
        Transform {
            position: Vec3::new(0.0, -0.3, 0.0),
            scale: Vec3::new(2.8, 0.1, 0.8),
            ..Transform::default()
        },
        cube,
        Material::lit(format!("{name}_pedestal"), Color::rgb(0.5, 0.5, 0.55)).into_ref(),
        Some(root),
    )?;
    Ok(root)
}

/// In `model_1` only `Sphere_3` glows, every mesh of `model_2` glows and
/// `model_3` never does.
pub fn build_scene() -> Result<Scene, SceneError> {
    let mut scene = Scene::new();

    add_model(&mut scene, "model_1", 0.0)?;
    // Tag before the other models exist: mesh names repeat across models.
    let tagged = scene.toggle_layer_named("Sphere_3", BLOOM_LAYER);
    tracing::debug!(tagged, "model_1 tagged");

    let model_2 = add_model(&mut scene, "model_2", 1.0)?;
    scene.toggle_layer_meshes_under(model_2, BLOOM_LAYER)?;

    add_model(&mut scene, "model_3", -1.0)?;
    Ok(scene)
}

pub fn camera() -> Camera {
    Camera::looking_at(Vec3::new(0.0, 0.5, 4.5), Vec3::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_render::TagStore;

    #[test]
    fn glow_set_matches_model_layout() {
        let scene = build_scene().unwrap();
        let tags = TagStore::default();
        assert_eq!(scene.mesh_count(), 12);

        let mut glowing = Vec::new();
        scene.traverse(|node, _| {
            if tags.is_glowing(node) {
                glowing.push(node.mesh().map(|m| m.material.name.clone()));
            }
        });
        glowing.sort();
        assert_eq!(glowing.len(), 5);
        assert!(glowing.contains(&Some("model_1_sphere_3".to_string())));
        assert!(!glowing.contains(&Some("model_1_sphere_1".to_string())));
        assert!(glowing.contains(&Some("model_2_pedestal".to_string())));
        assert!(glowing.iter().flatten().all(|n| !n.starts_with("model_3")));
    }

    #[test]
    fn groups_are_never_tagged() {
        let scene = build_scene().unwrap();
        let tags = TagStore::default();
        scene.traverse(|node, _| {
            if !node.has_material() {
                assert!(!tags.is_glowing(node), "group {} glows", node.name);
            }
        });
    }
}
