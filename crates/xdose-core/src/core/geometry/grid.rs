use super::{Aabb, ShapeError};
use itertools::iproduct;
use nalgebra::Point3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelIndex {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl VoxelIndex {
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }
}

/// Regular lattice of sample points covering a crystal's bounding box.
///
/// Grid point `(i, j, k)` sits at `origin + (i, j, k) / resolution`; the lattice
/// includes both faces of the box along every axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    origin: Point3<f64>,
    resolution: f64,
    dims: [usize; 3],
}

impl VoxelGrid {
    pub fn covering(bbox: &Aabb, resolution: f64) -> Result<Self, ShapeError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ShapeError::InvalidResolution(resolution));
        }
        let extent = bbox.extent();
        let dims = [0, 1, 2]
            .map(|axis| (extent[axis] * resolution - 1e-9).ceil().max(0.0) as usize + 1);
        Ok(Self {
            origin: bbox.min,
            resolution,
            dims,
        })
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    /// Voxels per µm.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Voxel edge length in µm.
    pub fn voxel_size(&self) -> f64 {
        1.0 / self.resolution
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coordinate(&self, index: VoxelIndex) -> Point3<f64> {
        self.origin
            + nalgebra::Vector3::new(index.i as f64, index.j as f64, index.k as f64)
                / self.resolution
    }

    /// Nearest grid point to `point`, if it lies within the lattice.
    pub fn index_of(&self, point: &Point3<f64>) -> Option<VoxelIndex> {
        let scaled = (point - self.origin) * self.resolution;
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let rounded = scaled[axis].round();
            if rounded < 0.0 || rounded as usize >= self.dims[axis] {
                return None;
            }
            index[axis] = rounded as usize;
        }
        Some(VoxelIndex::new(index[0], index[1], index[2]))
    }

    pub fn linear_index(&self, index: VoxelIndex) -> usize {
        (index.i * self.dims[1] + index.j) * self.dims[2] + index.k
    }

    pub fn indices(&self) -> impl Iterator<Item = VoxelIndex> + '_ {
        iproduct!(0..self.dims[0], 0..self.dims[1], 0..self.dims[2])
            .map(|(i, j, k)| VoxelIndex::new(i, j, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> VoxelGrid {
        let bbox = Aabb {
            min: Point3::new(-50.0, -40.0, -30.0),
            max: Point3::new(50.0, 40.0, 30.0),
        };
        VoxelGrid::covering(&bbox, 0.1).unwrap()
    }

    #[test]
    fn covering_includes_both_faces() {
        let grid = grid();
        assert_eq!(grid.dims(), [11, 9, 7]);
        assert_eq!(grid.len(), 11 * 9 * 7);
        assert_eq!(grid.coordinate(VoxelIndex::new(10, 8, 6)), Point3::new(50.0, 40.0, 30.0));
    }

    #[test]
    fn covering_rejects_invalid_resolution() {
        let bbox = Aabb {
            min: Point3::origin(),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        assert_eq!(
            VoxelGrid::covering(&bbox, 0.0),
            Err(ShapeError::InvalidResolution(0.0))
        );
    }

    #[test]
    fn index_coordinate_round_trip_at_every_grid_point() {
        let grid = grid();
        for index in grid.indices() {
            let coordinate = grid.coordinate(index);
            assert_eq!(grid.index_of(&coordinate), Some(index));
        }
    }

    #[test]
    fn index_of_outside_lattice_is_none() {
        let grid = grid();
        assert_eq!(grid.index_of(&Point3::new(-80.0, 0.0, 0.0)), None);
        assert_eq!(grid.index_of(&Point3::new(0.0, 0.0, 31.0 + 10.0)), None);
    }

    #[test]
    fn linear_index_is_dense_and_ordered() {
        let grid = grid();
        for (n, index) in grid.indices().enumerate() {
            assert_eq!(grid.linear_index(index), n);
        }
    }
}
