use crate::error::RenderError;
use crate::target::RenderTarget;
use afterglow_common::Color;
use afterglow_scene::{Camera, Material, Scene};
use glam::{Vec2, Vec3};

/// Triangles with a vertex this close to (or behind) the eye are dropped.
const W_EPSILON: f32 = 1e-5;

/// Scanline-free software rasterizer: edge functions + depth test.
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    pub light_dir: Vec3,
    pub ambient: f32,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self {
            light_dir: Vec3::new(0.3, 1.0, 0.5).normalize(),
            ambient: 0.3,
        }
    }
}

impl Rasterizer {
    /// Flat color for one face of a mesh using `material`.
    pub fn shade(&self, material: &Material, normal: Vec3) -> Color {
        let base = if material.unlit {
            material.color
        } else {
            let diffuse = normal.dot(self.light_dir).max(0.0);
            material
                .color
                .scale_rgb(self.ambient + diffuse * (1.0 - self.ambient))
        };
        let e = material.emissive;
        Color::rgba(base.r + e.r, base.g + e.g, base.b + e.b, base.a)
    }

    /// Draw every mesh of `scene` into `target` (which is not cleared).
    /// Returns the number of triangles rasterized.
    pub fn draw(
        &self,
        scene: &Scene,
        camera: &Camera,
        target: &mut RenderTarget,
    ) -> Result<usize, RenderError> {
        let view_proj = camera.view_projection();
        let viewport = target.viewport();
        let size = Vec2::new(viewport.width as f32, viewport.height as f32);
        let (color_plane, depth_plane) = target.planes_mut();

        let mut drawn = 0;
        let mut failure = None;
        scene.traverse(|node, world| {
            if failure.is_some() {
                return;
            }
            let Some(mesh) = node.mesh() else {
                return;
            };
            let geometry = &mesh.geometry;
            if let Err(source) = geometry.validate() {
                failure = Some(RenderError::InvalidGeometry {
                    node: node.id(),
                    source,
                });
                return;
            }

            let mvp = view_proj * world;
            let normal_matrix = world.inverse().transpose();
            for tri in geometry.indices.chunks_exact(3) {
                let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                let clip = idx.map(|i| mvp * geometry.positions[i].extend(1.0));
                if clip.iter().any(|c| c.w <= W_EPSILON) {
                    continue;
                }
                let screen = clip.map(|c| {
                    let ndc = c.truncate() / c.w;
                    Vec3::new(
                        (ndc.x * 0.5 + 0.5) * size.x,
                        (0.5 - ndc.y * 0.5) * size.y,
                        ndc.z,
                    )
                });

                let normal = normal_matrix
                    .transform_vector3(
                        geometry.normals[idx[0]] + geometry.normals[idx[1]] + geometry.normals[idx[2]],
                    )
                    .normalize_or_zero();
                let color = self.shade(&mesh.material, normal);

                if fill_triangle(color_plane, depth_plane, viewport.width, viewport.height, screen, color) {
                    drawn += 1;
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(drawn),
        }
    }
}

fn edge(a: Vec3, b: Vec3, p: Vec2) -> f32 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

/// Fill one screen-space triangle with a depth test. Returns false when the
/// triangle is degenerate or entirely off screen.
fn fill_triangle(
    color: &mut [Color],
    depth: &mut [f32],
    width: u32,
    height: u32,
    [a, b, c]: [Vec3; 3],
    fill: Color,
) -> bool {
    let area = edge(a, b, Vec2::new(c.x, c.y));
    if area.abs() <= f32::EPSILON {
        return false;
    }

    let min = a.min(b).min(c);
    let max = a.max(b).max(c);
    if max.x < 0.0 || max.y < 0.0 || min.x >= width as f32 || min.y >= height as f32 {
        return false;
    }
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil() as u32).min(width - 1);
    let y1 = (max.y.ceil() as u32).min(height - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let z = w0 * a.z + w1 * b.z + w2 * c.z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let i = y as usize * width as usize + x as usize;
            if z < depth[i] {
                depth[i] = z;
                color[i] = fill;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_common::{Transform, Viewport};
    use afterglow_scene::Geometry;
    use std::sync::Arc;

    fn front_camera() -> Camera {
        let mut cam = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        cam.set_viewport(Viewport::new(32, 32));
        cam
    }

    fn cleared(w: u32, h: u32) -> RenderTarget {
        let mut t = RenderTarget::new(Viewport::new(w, h)).unwrap();
        t.clear(Color::BLACK);
        t
    }

    #[test]
    fn cube_covers_centre_not_corner() {
        let mut scene = Scene::new();
        let red = Material::flat("red", Color::rgb(1.0, 0.0, 0.0)).into_ref();
        scene
            .add_mesh("cube", Transform::default(), Arc::new(Geometry::cube(1.0)), red, None)
            .unwrap();

        let mut target = cleared(32, 32);
        let drawn = Rasterizer::default().draw(&scene, &front_camera(), &mut target).unwrap();
        assert!(drawn > 0);
        assert_eq!(target.pixel(16, 16), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(target.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn nearer_mesh_wins_depth_test() {
        let mut scene = Scene::new();
        let cube = Arc::new(Geometry::cube(1.0));
        let far = Material::flat("far", Color::rgb(0.0, 0.0, 1.0)).into_ref();
        let near = Material::flat("near", Color::rgb(0.0, 1.0, 0.0)).into_ref();
        scene
            .add_mesh("near", Transform::from_position(Vec3::new(0.0, 0.0, 1.0)), cube.clone(), near, None)
            .unwrap();
        scene
            .add_mesh("far", Transform::from_position(Vec3::new(0.0, 0.0, -1.0)), cube, far, None)
            .unwrap();

        let mut target = cleared(32, 32);
        Rasterizer::default().draw(&scene, &front_camera(), &mut target).unwrap();
        assert_eq!(target.pixel(16, 16), Some(Color::rgb(0.0, 1.0, 0.0)));
    }

    #[test]
    fn geometry_behind_camera_is_skipped() {
        let mut scene = Scene::new();
        let white = Material::flat("w", Color::WHITE).into_ref();
        scene
            .add_mesh(
                "behind",
                Transform::from_position(Vec3::new(0.0, 0.0, 20.0)),
                Arc::new(Geometry::cube(1.0)),
                white,
                None,
            )
            .unwrap();

        let mut target = cleared(16, 16);
        let drawn = Rasterizer::default().draw(&scene, &front_camera(), &mut target).unwrap();
        assert_eq!(drawn, 0);
        assert!(target.pixels().iter().all(|c| *c == Color::BLACK));
    }

    #[test]
    fn invalid_geometry_fails_draw() {
        let mut scene = Scene::new();
        let mut broken = Geometry::cube(1.0);
        broken.indices[0] = 1000;
        let id = scene
            .add_mesh(
                "broken",
                Transform::default(),
                Arc::new(broken),
                Material::default().into_ref(),
                None,
            )
            .unwrap();

        let mut target = cleared(8, 8);
        let err = Rasterizer::default().draw(&scene, &front_camera(), &mut target).unwrap_err();
        assert!(matches!(err, RenderError::InvalidGeometry { node, .. } if node == id));
    }

    #[test]
    fn lit_shading_uses_ambient_floor_and_emissive() {
        let r = Rasterizer::default();
        let m = Material::lit("m", Color::WHITE).with_emissive(Color::rgb(0.5, 0.0, 0.0));
        let away = r.shade(&m, -r.light_dir);
        assert!((away.r - (r.ambient + 0.5)).abs() < 1e-6);
        assert!((away.g - r.ambient).abs() < 1e-6);
        assert_eq!(away.a, 1.0);

        let facing = r.shade(&m, r.light_dir);
        assert!((facing.g - 1.0).abs() < 1e-6);
    }
}
