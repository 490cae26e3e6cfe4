//! Analytic crystal shapes centred on the origin of their own body frame.
//!
//! Exit distances are closed-form. Every query takes a point and a unit direction
//! already expressed in the body frame, and returns zero for points outside the shape.

use super::{Aabb, CONTAINMENT_EPSILON, ShapeError};
use nalgebra::{Point3, Rotation3, Vector3};

fn positive(name: &'static str, value: f64) -> Result<f64, ShapeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ShapeError::InvalidDimension { name, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid {
    half_extents: Vector3<f64>,
}

impl Cuboid {
    pub fn new(x_um: f64, y_um: f64, z_um: f64) -> Result<Self, ShapeError> {
        Ok(Self {
            half_extents: Vector3::new(
                positive("x", x_um)? / 2.0,
                positive("y", y_um)? / 2.0,
                positive("z", z_um)? / 2.0,
            ),
        })
    }

    pub fn half_extents(&self) -> &Vector3<f64> {
        &self.half_extents
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|axis| p[axis].abs() <= self.half_extents[axis] + CONTAINMENT_EPSILON)
    }

    pub fn exit_distance(&self, p: &Point3<f64>, d: &Vector3<f64>) -> f64 {
        if !self.contains(p) {
            return 0.0;
        }
        (0..3)
            .filter(|&axis| d[axis] != 0.0)
            .map(|axis| (self.half_extents[axis].copysign(d[axis]) - p[axis]) / d[axis])
            .fold(f64::INFINITY, f64::min)
            .max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    radius: f64,
}

impl Sphere {
    pub fn new(diameter_um: f64) -> Result<Self, ShapeError> {
        Ok(Self {
            radius: positive("diameter", diameter_um)? / 2.0,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        p.coords.norm() <= self.radius + CONTAINMENT_EPSILON
    }

    pub fn exit_distance(&self, p: &Point3<f64>, d: &Vector3<f64>) -> f64 {
        if !self.contains(p) {
            return 0.0;
        }
        let b = p.coords.dot(d);
        let c = p.coords.norm_squared() - self.radius * self.radius;
        (-b + (b * b - c).max(0.0).sqrt()).max(0.0)
    }
}

/// Right circular cylinder with its axis along body-frame y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    radius: f64,
    half_height: f64,
}

impl Cylinder {
    pub fn new(diameter_um: f64, height_um: f64) -> Result<Self, ShapeError> {
        Ok(Self {
            radius: positive("diameter", diameter_um)? / 2.0,
            half_height: positive("height", height_um)? / 2.0,
        })
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        p.y.abs() <= self.half_height + CONTAINMENT_EPSILON
            && (p.x * p.x + p.z * p.z).sqrt() <= self.radius + CONTAINMENT_EPSILON
    }

    pub fn exit_distance(&self, p: &Point3<f64>, d: &Vector3<f64>) -> f64 {
        if !self.contains(p) {
            return 0.0;
        }
        let cap = if d.y != 0.0 {
            (self.half_height.copysign(d.y) - p.y) / d.y
        } else {
            f64::INFINITY
        };

        let a = d.x * d.x + d.z * d.z;
        let side = if a > f64::EPSILON {
            let b = p.x * d.x + p.z * d.z;
            let c = p.x * p.x + p.z * p.z - self.radius * self.radius;
            (-b + (b * b - a * c).max(0.0).sqrt()) / a
        } else {
            f64::INFINITY
        };

        cap.min(side).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Cuboid(Cuboid),
    Sphere(Sphere),
    Cylinder(Cylinder),
}

impl Primitive {
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        match self {
            Primitive::Cuboid(shape) => shape.contains(p),
            Primitive::Sphere(shape) => shape.contains(p),
            Primitive::Cylinder(shape) => shape.contains(p),
        }
    }

    pub fn exit_distance(&self, p: &Point3<f64>, d: &Vector3<f64>) -> f64 {
        match self {
            Primitive::Cuboid(shape) => shape.exit_distance(p, d),
            Primitive::Sphere(shape) => shape.exit_distance(p, d),
            Primitive::Cylinder(shape) => shape.exit_distance(p, d),
        }
    }

    /// Axis-aligned box of the shape after `orientation` is applied.
    pub fn bounding_box(&self, orientation: &Rotation3<f64>) -> Aabb {
        let half = match self {
            Primitive::Cuboid(shape) => shape.half_extents,
            Primitive::Sphere(shape) => {
                let r = shape.radius;
                return Aabb {
                    min: Point3::new(-r, -r, -r),
                    max: Point3::new(r, r, r),
                };
            }
            Primitive::Cylinder(shape) => {
                Vector3::new(shape.radius, shape.half_height, shape.radius)
            }
        };
        let corners: Vec<Point3<f64>> = itertools::iproduct!([-1.0, 1.0], [-1.0, 1.0], [-1.0, 1.0])
            .map(|(sx, sy, sz)| orientation * Point3::new(sx * half.x, sy * half.y, sz * half.z))
            .collect();
        Aabb::from_points(corners.iter()).unwrap_or(Aabb {
            min: Point3::origin(),
            max: Point3::origin(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn constructors_reject_non_positive_dimensions() {
        assert_eq!(
            Cuboid::new(10.0, 0.0, 5.0),
            Err(ShapeError::InvalidDimension { name: "y", value: 0.0 })
        );
        assert!(Sphere::new(-1.0).is_err());
        assert!(Cylinder::new(10.0, f64::NAN).is_err());
    }

    #[test]
    fn cuboid_exit_distance_along_axes() {
        let cuboid = Cuboid::new(100.0, 80.0, 60.0).unwrap();
        let p = Point3::new(10.0, 0.0, -5.0);
        let up = cuboid.exit_distance(&p, &Vector3::new(0.0, 0.0, -1.0));
        let right = cuboid.exit_distance(&p, &Vector3::new(1.0, 0.0, 0.0));
        assert!((up - 25.0).abs() < TOLERANCE);
        assert!((right - 40.0).abs() < TOLERANCE);
    }

    #[test]
    fn cuboid_exit_distance_along_diagonal_hits_nearest_wall() {
        let cuboid = Cuboid::new(20.0, 20.0, 20.0).unwrap();
        let d = Vector3::new(1.0, 0.0, 1.0).normalize();
        let exit = cuboid.exit_distance(&Point3::new(5.0, 0.0, 0.0), &d);
        assert!((exit - 5.0 * 2f64.sqrt()).abs() < TOLERANCE);
    }

    #[test]
    fn sphere_exit_distance_from_center_is_radius() {
        let sphere = Sphere::new(50.0).unwrap();
        let exit = sphere.exit_distance(&Point3::origin(), &Vector3::new(0.6, 0.0, -0.8));
        assert!((exit - 25.0).abs() < TOLERANCE);
    }

    #[test]
    fn sphere_exit_distance_off_center() {
        let sphere = Sphere::new(20.0).unwrap();
        let exit = sphere.exit_distance(&Point3::new(0.0, 6.0, 0.0), &Vector3::new(0.0, 0.0, 1.0));
        assert!((exit - 8.0).abs() < TOLERANCE);
    }

    #[test]
    fn cylinder_exit_distance_through_side_and_cap() {
        let cylinder = Cylinder::new(20.0, 40.0).unwrap();
        let side = cylinder.exit_distance(&Point3::origin(), &Vector3::new(0.0, 0.0, -1.0));
        let cap = cylinder.exit_distance(&Point3::new(0.0, 15.0, 0.0), &Vector3::new(0.0, 1.0, 0.0));
        assert!((side - 10.0).abs() < TOLERANCE);
        assert!((cap - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn exit_distance_outside_shape_is_zero() {
        let d = Vector3::new(0.0, 0.0, 1.0);
        let outside = Point3::new(100.0, 0.0, 0.0);
        assert_eq!(Cuboid::new(1.0, 1.0, 1.0).unwrap().exit_distance(&outside, &d), 0.0);
        assert_eq!(Sphere::new(1.0).unwrap().exit_distance(&outside, &d), 0.0);
        assert_eq!(Cylinder::new(1.0, 1.0).unwrap().exit_distance(&outside, &d), 0.0);
    }

    #[test]
    fn rotated_cuboid_bounding_box_swaps_extents() {
        let cuboid = Primitive::Cuboid(Cuboid::new(100.0, 20.0, 10.0).unwrap());
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let bbox = cuboid.bounding_box(&rotation);
        let extent = bbox.extent();
        assert!((extent.x - 20.0).abs() < 1e-9);
        assert!((extent.y - 100.0).abs() < 1e-9);
        assert!((extent.z - 10.0).abs() < 1e-9);
    }
}
