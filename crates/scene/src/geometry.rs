use glam::Vec3;

/// Structural problems in a [`Geometry`] that make it undrawable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("index count {0} is not a multiple of 3")]
    PartialTriangle(usize),
    #[error("index {index} out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds { index: u32, vertex_count: usize },
    #[error("{normals} normals for {positions} positions")]
    NormalCountMismatch { positions: usize, normals: usize },
}

/// Indexed triangle list with per-vertex normals.
///
/// The compositor never looks inside geometry; only the rasterizing
/// backends do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::PartialTriangle(self.indices.len()));
        }
        if self.normals.len() != self.positions.len() {
            return Err(GeometryError::NormalCountMismatch {
                positions: self.positions.len(),
                normals: self.normals.len(),
            });
        }
        let vertex_count = self.positions.len();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GeometryError::IndexOutOfBounds {
                index,
                vertex_count,
            });
        }
        Ok(())
    }

    /// Axis-aligned cube centred on the origin, 24 vertices with face normals.
    pub fn cube(size: f32) -> Self {
        let p = size * 0.5;
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::Z,
                [
                    Vec3::new(-p, -p, p),
                    Vec3::new(p, -p, p),
                    Vec3::new(p, p, p),
                    Vec3::new(-p, p, p),
                ],
            ),
            (
                Vec3::NEG_Z,
                [
                    Vec3::new(p, -p, -p),
                    Vec3::new(-p, -p, -p),
                    Vec3::new(-p, p, -p),
                    Vec3::new(p, p, -p),
                ],
            ),
            (
                Vec3::X,
                [
                    Vec3::new(p, -p, p),
                    Vec3::new(p, -p, -p),
                    Vec3::new(p, p, -p),
                    Vec3::new(p, p, p),
                ],
            ),
            (
                Vec3::NEG_X,
                [
                    Vec3::new(-p, -p, -p),
                    Vec3::new(-p, -p, p),
                    Vec3::new(-p, p, p),
                    Vec3::new(-p, p, -p),
                ],
            ),
            (
                Vec3::Y,
                [
                    Vec3::new(-p, p, p),
                    Vec3::new(p, p, p),
                    Vec3::new(p, p, -p),
                    Vec3::new(-p, p, -p),
                ],
            ),
            (
                Vec3::NEG_Y,
                [
                    Vec3::new(-p, -p, -p),
                    Vec3::new(p, -p, -p),
                    Vec3::new(p, -p, p),
                    Vec3::new(-p, -p, p),
                ],
            ),
        ];

        let mut geometry = Self::default();
        for (normal, corners) in faces {
            let base = geometry.positions.len() as u32;
            geometry.positions.extend_from_slice(&corners);
            geometry.normals.extend_from_slice(&[normal; 4]);
            geometry
                .indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        geometry
    }

    /// Latitude/longitude sphere. `segments` and `rings` are clamped to at
    /// least 3 and 2 so the result is always a closed solid.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut geometry = Self::default();

        for ring in 0..=rings {
            let theta = ring as f32 / rings as f32 * std::f32::consts::PI;
            for segment in 0..=segments {
                let phi = segment as f32 / segments as f32 * std::f32::consts::TAU;
                let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                geometry.positions.push(normal * radius);
                geometry.normals.push(normal);
            }
        }

        let stride = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                geometry
                    .indices
                    .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_is_valid() {
        let cube = Geometry::cube(1.0);
        assert_eq!(cube.positions.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn sphere_is_valid() {
        let sphere = Geometry::uv_sphere(0.5, 8, 4);
        assert!(sphere.validate().is_ok());
        assert_eq!(sphere.triangle_count(), 8 * 4 * 2);
        for p in &sphere.positions {
            assert!((p.length() - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn degenerate_sphere_parameters_are_clamped() {
        let sphere = Geometry::uv_sphere(1.0, 0, 0);
        assert!(sphere.validate().is_ok());
        assert_eq!(sphere.triangle_count(), 3 * 2 * 2);
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let mut cube = Geometry::cube(1.0);
        cube.indices[4] = 99;
        assert_eq!(
            cube.validate(),
            Err(GeometryError::IndexOutOfBounds {
                index: 99,
                vertex_count: 24
            })
        );
    }

    #[test]
    fn partial_triangle_is_rejected() {
        let mut cube = Geometry::cube(1.0);
        cube.indices.pop();
        assert_eq!(cube.validate(), Err(GeometryError::PartialTriangle(35)));
    }
}
