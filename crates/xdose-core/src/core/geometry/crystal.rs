use super::grid::{VoxelGrid, VoxelIndex};
use super::mesh::Mesh;
use super::primitives::Primitive;
use super::{Aabb, GeometryError, ShapeError};
use crate::core::utils::geometry::{crystal_orientation, upstream_direction};
use crate::core::wedge::AngleStep;
use nalgebra::{Point3, Rotation3, Vector3};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub enum CrystalShape {
    Polyhedron(Mesh),
    Primitive(Primitive),
}

#[derive(Debug, Clone, PartialEq)]
enum DirectionCache {
    /// Per-face `n · d` for the upstream and downstream directions.
    Mesh {
        upstream_dots: Vec<f64>,
        downstream_dots: Vec<f64>,
    },
    /// Upstream direction in the primitive's body frame.
    Body { upstream: Vector3<f64> },
}

/// Immutable per-angle depth-finding state.
///
/// Built once per angle step, before any voxel is processed, and shared read-only
/// by every voxel of that step.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    angle_rad: f64,
    upstream: Vector3<f64>,
    cache: DirectionCache,
}

impl DepthSnapshot {
    pub fn angle_rad(&self) -> f64 {
        self.angle_rad
    }

    /// Unit vector towards the source, in crystal coordinates.
    pub fn upstream(&self) -> &Vector3<f64> {
        &self.upstream
    }
}

/// An oriented crystal and the voxel grid that samples it.
///
/// Meshes are stored already rotated into the crystal frame; primitives keep their
/// body frame and the orientation is applied per query.
#[derive(Debug, Clone)]
pub struct Crystal {
    shape: CrystalShape,
    orientation: Rotation3<f64>,
    bounding_box: Aabb,
    grid: VoxelGrid,
    interior: Vec<VoxelIndex>,
}

impl Crystal {
    pub fn new(
        shape: CrystalShape,
        angle_p_deg: f64,
        angle_l_deg: f64,
        resolution: f64,
    ) -> Result<Self, ShapeError> {
        let orientation = crystal_orientation(angle_p_deg, angle_l_deg);
        let (shape, bounding_box) = match shape {
            CrystalShape::Polyhedron(mesh) => {
                let oriented = mesh.transformed(&orientation);
                let bbox = oriented.bounding_box();
                (CrystalShape::Polyhedron(oriented), bbox)
            }
            CrystalShape::Primitive(primitive) => {
                let bbox = primitive.bounding_box(&orientation);
                (CrystalShape::Primitive(primitive), bbox)
            }
        };
        let grid = VoxelGrid::covering(&bounding_box, resolution)?;

        let mut crystal = Self {
            shape,
            orientation,
            bounding_box,
            grid,
            interior: Vec::new(),
        };
        crystal.interior = crystal.find_interior_voxels();
        if crystal.interior.is_empty() {
            return Err(ShapeError::NoInteriorVoxels);
        }

        debug!(
            grid_points = crystal.grid.len(),
            interior_voxels = crystal.interior.len(),
            "Crystal voxel grid built."
        );
        Ok(crystal)
    }

    fn find_interior_voxels(&self) -> Vec<VoxelIndex> {
        let candidates: Vec<VoxelIndex> = self.grid.indices().collect();

        #[cfg(feature = "parallel")]
        let iter = candidates.into_par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = candidates.into_iter();

        iter.filter(|&index| self.contains(&self.grid.coordinate(index)))
            .collect()
    }

    pub fn shape(&self) -> &CrystalShape {
        &self.shape
    }

    pub fn orientation(&self) -> &Rotation3<f64> {
        &self.orientation
    }

    pub fn bounding_box(&self) -> &Aabb {
        &self.bounding_box
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Grid points inside the crystal, in grid order.
    pub fn interior_voxels(&self) -> &[VoxelIndex] {
        &self.interior
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        match &self.shape {
            CrystalShape::Polyhedron(mesh) => mesh.contains(point),
            CrystalShape::Primitive(primitive) => {
                primitive.contains(&self.orientation.inverse_transform_point(point))
            }
        }
    }

    /// Precomputes the per-angle direction caches for one wedge step.
    pub fn setup_depth_finding(&self, step: &AngleStep) -> DepthSnapshot {
        let angle_rad = step.angle_rad();
        let upstream = upstream_direction(angle_rad);
        let cache = match &self.shape {
            CrystalShape::Polyhedron(mesh) => {
                let upstream_dots = mesh.face_dots(&upstream);
                let downstream_dots = upstream_dots.iter().map(|d| -d).collect();
                DirectionCache::Mesh {
                    upstream_dots,
                    downstream_dots,
                }
            }
            CrystalShape::Primitive(_) => DirectionCache::Body {
                upstream: self.orientation.inverse_transform_vector(&upstream),
            },
        };
        DepthSnapshot {
            angle_rad,
            upstream,
            cache,
        }
    }

    /// Path length through the crystal from `point` towards the source.
    pub fn find_depth(
        &self,
        point: &Point3<f64>,
        snapshot: &DepthSnapshot,
    ) -> Result<f64, GeometryError> {
        self.trace(point, snapshot, false)
    }

    /// Path length through the crystal from `point` along the beam, away from the source.
    pub fn find_exit_depth(
        &self,
        point: &Point3<f64>,
        snapshot: &DepthSnapshot,
    ) -> Result<f64, GeometryError> {
        self.trace(point, snapshot, true)
    }

    fn trace(
        &self,
        point: &Point3<f64>,
        snapshot: &DepthSnapshot,
        downstream: bool,
    ) -> Result<f64, GeometryError> {
        match (&self.shape, &snapshot.cache) {
            (
                CrystalShape::Polyhedron(mesh),
                DirectionCache::Mesh {
                    upstream_dots,
                    downstream_dots,
                },
            ) => {
                if downstream {
                    mesh.depth(point, &-snapshot.upstream, downstream_dots)
                } else {
                    mesh.depth(point, &snapshot.upstream, upstream_dots)
                }
            }
            (CrystalShape::Primitive(primitive), DirectionCache::Body { upstream }) => {
                let body_point = self.orientation.inverse_transform_point(point);
                let direction = if downstream { -upstream } else { *upstream };
                Ok(primitive.exit_distance(&body_point, &direction))
            }
            // Snapshot taken from another crystal.
            _ => self.trace(point, &self.setup_depth_finding_at(snapshot.angle_rad), downstream),
        }
    }

    fn setup_depth_finding_at(&self, angle_rad: f64) -> DepthSnapshot {
        self.setup_depth_finding(&AngleStep {
            index: 0,
            angle_deg: angle_rad.to_degrees(),
            exposure_s: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::mesh::tests::{u_prism, unit_cube_faces};
    use crate::core::geometry::primitives::{Cuboid, Sphere};

    fn step_at(angle_deg: f64) -> AngleStep {
        AngleStep {
            index: 0,
            angle_deg,
            exposure_s: 1.0,
        }
    }

    fn cuboid_mesh(x: f64, y: f64, z: f64) -> Mesh {
        let (vertices, faces) = unit_cube_faces();
        let scaled = vertices
            .into_iter()
            .map(|v| Point3::new((v.x - 0.5) * x, (v.y - 0.5) * y, (v.z - 0.5) * z))
            .collect();
        Mesh::new(scaled, faces).unwrap()
    }

    #[test]
    fn unrotated_cuboid_depth_matches_grid_z_index() {
        let resolution = 0.5;
        let shapes = [
            CrystalShape::Primitive(Primitive::Cuboid(Cuboid::new(40.0, 30.0, 20.0).unwrap())),
            CrystalShape::Polyhedron(cuboid_mesh(40.0, 30.0, 20.0)),
        ];
        for shape in shapes {
            let crystal = Crystal::new(shape, 0.0, 0.0, resolution).unwrap();
            let snapshot = crystal.setup_depth_finding(&step_at(0.0));
            for &index in crystal.interior_voxels() {
                let point = crystal.grid().coordinate(index);
                let depth = crystal.find_depth(&point, &snapshot).unwrap();
                assert!(
                    (depth - index.k as f64 / resolution).abs() <= 2.0,
                    "voxel {index:?}: depth {depth}"
                );
            }
        }
    }

    #[test]
    fn exit_depth_is_complement_of_depth_in_cuboid() {
        let crystal = Crystal::new(
            CrystalShape::Primitive(Primitive::Cuboid(Cuboid::new(40.0, 30.0, 20.0).unwrap())),
            0.0,
            0.0,
            1.0,
        )
        .unwrap();
        let snapshot = crystal.setup_depth_finding(&step_at(30.0));
        let point = Point3::new(1.0, 2.0, 3.0);
        let total = crystal.find_depth(&point, &snapshot).unwrap()
            + crystal.find_exit_depth(&point, &snapshot).unwrap();
        // The chord through (1, 2, 3) at 30 degrees exits through both z faces.
        assert!((total - 20.0 / 30f64.to_radians().cos()).abs() < 1e-9);
    }

    #[test]
    fn rotation_by_ninety_degrees_traces_along_x() {
        let crystal = Crystal::new(
            CrystalShape::Primitive(Primitive::Cuboid(Cuboid::new(40.0, 30.0, 20.0).unwrap())),
            0.0,
            0.0,
            1.0,
        )
        .unwrap();
        let snapshot = crystal.setup_depth_finding(&step_at(90.0));
        let depth = crystal.find_depth(&Point3::new(5.0, 0.0, 0.0), &snapshot).unwrap();
        assert!((depth - 15.0).abs() < 1e-9);
    }

    #[test]
    fn mounting_orientation_rotates_the_shape() {
        // angle_p = 90 turns the 40 µm x edge onto y.
        let crystal = Crystal::new(
            CrystalShape::Primitive(Primitive::Cuboid(Cuboid::new(40.0, 10.0, 10.0).unwrap())),
            90.0,
            0.0,
            1.0,
        )
        .unwrap();
        let extent = crystal.bounding_box().extent();
        assert!((extent.y - 40.0).abs() < 1e-9);
        assert!(crystal.contains(&Point3::new(0.0, 18.0, 0.0)));
        assert!(!crystal.contains(&Point3::new(18.0, 0.0, 0.0)));
    }

    #[test]
    fn setup_depth_finding_is_idempotent_and_stateless() {
        let crystal = Crystal::new(CrystalShape::Polyhedron(u_prism()), 10.0, 20.0, 0.2).unwrap();
        let first = crystal.setup_depth_finding(&step_at(17.0));
        let second = crystal.setup_depth_finding(&step_at(17.0));
        assert_eq!(first, second);

        let _other = crystal.setup_depth_finding(&step_at(123.0));
        let third = crystal.setup_depth_finding(&step_at(17.0));
        assert_eq!(first, third);

        let point = crystal.grid().coordinate(crystal.interior_voxels()[0]);
        assert_eq!(
            crystal.find_depth(&point, &first).unwrap(),
            crystal.find_depth(&point, &third).unwrap()
        );
    }

    #[test]
    fn concave_crystal_depths_at_ninety_degrees() {
        let crystal = Crystal::new(CrystalShape::Polyhedron(u_prism()), 0.0, 0.0, 0.5).unwrap();
        let snapshot = crystal.setup_depth_finding(&step_at(90.0));
        let thick = crystal.find_depth(&Point3::new(10.0, 10.0, 10.0), &snapshot).unwrap();
        let thin = crystal.find_depth(&Point3::new(10.0, 10.0, 40.0), &snapshot).unwrap();
        assert!((thick - 60.0).abs() < 1e-6);
        assert!((thin - 40.0).abs() < 1e-6);
    }

    #[test]
    fn voxel_on_inner_wall_is_shadowed_by_the_opposite_arm() {
        let crystal = Crystal::new(CrystalShape::Polyhedron(u_prism()), 0.0, 0.0, 0.5).unwrap();
        let index = crystal.grid().index_of(&Point3::new(50.0, 10.0, 40.0)).unwrap();
        assert!(crystal.interior_voxels().contains(&index));

        // Upstream is -x: the ray crosses the gap and then the 30 µm left arm.
        let snapshot = crystal.setup_depth_finding(&step_at(-90.0));
        let point = crystal.grid().coordinate(index);
        let depth = crystal.find_depth(&point, &snapshot).unwrap();
        assert!((depth - 30.0).abs() < 1e-6, "depth {depth}");
    }

    #[test]
    fn sphere_interior_voxels_lie_within_radius() {
        let crystal = Crystal::new(
            CrystalShape::Primitive(Primitive::Sphere(Sphere::new(20.0).unwrap())),
            0.0,
            0.0,
            1.0,
        )
        .unwrap();
        assert!(crystal.interior_voxels().len() < crystal.grid().len());
        for &index in crystal.interior_voxels() {
            assert!(crystal.grid().coordinate(index).coords.norm() <= 10.0 + 1e-9);
        }
    }

    #[test]
    fn grid_that_misses_the_crystal_is_rejected() {
        let result = Crystal::new(
            CrystalShape::Primitive(Primitive::Sphere(Sphere::new(1.0).unwrap())),
            0.0,
            0.0,
            0.01,
        );
        assert_eq!(result.err(), Some(ShapeError::NoInteriorVoxels));
    }
}
