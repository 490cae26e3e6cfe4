use crate::core::utils::geometry::to_beam_frame;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

/// Guards the step count against `range / resolution` landing a hair above an integer.
const STEP_COUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WedgeError {
    #[error("Invalid wedge parameter '{name}': {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// One angular position of a wedge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleStep {
    pub index: usize,
    pub angle_deg: f64,
    pub exposure_s: f64,
}

impl AngleStep {
    pub fn angle_rad(&self) -> f64 {
        self.angle_deg.to_radians()
    }
}

/// A rotation series: the crystal turns about the vertical axis from `start_angle_deg`
/// through a signed `rotation_range_deg` while being exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct Wedge {
    start_angle_deg: f64,
    rotation_range_deg: f64,
    angular_resolution_deg: f64,
    exposure_time_s: f64,
    start_offset: Vector3<f64>,
    translate_per_degree: Vector3<f64>,
    rot_ax_beam_offset: f64,
}

impl Wedge {
    pub fn new(
        start_angle_deg: f64,
        rotation_range_deg: f64,
        angular_resolution_deg: f64,
        exposure_time_s: f64,
    ) -> Result<Self, WedgeError> {
        let check = |name: &'static str, value: f64, ok: bool| {
            if value.is_finite() && ok {
                Ok(())
            } else {
                Err(WedgeError::InvalidParameter { name, value })
            }
        };
        check("start_angle", start_angle_deg, true)?;
        check("rotation_range", rotation_range_deg, true)?;
        check(
            "angular_resolution",
            angular_resolution_deg,
            angular_resolution_deg > 0.0,
        )?;
        check("exposure_time", exposure_time_s, exposure_time_s > 0.0)?;

        Ok(Self {
            start_angle_deg,
            rotation_range_deg,
            angular_resolution_deg,
            exposure_time_s,
            start_offset: Vector3::zeros(),
            translate_per_degree: Vector3::zeros(),
            rot_ax_beam_offset: 0.0,
        })
    }

    pub fn with_start_offset(mut self, offset_um: Vector3<f64>) -> Self {
        self.start_offset = offset_um;
        self
    }

    pub fn with_translation_per_degree(mut self, translation_um: Vector3<f64>) -> Self {
        self.translate_per_degree = translation_um;
        self
    }

    pub fn with_rot_ax_beam_offset(mut self, offset_um: f64) -> Self {
        self.rot_ax_beam_offset = offset_um;
        self
    }

    pub fn start_angle_deg(&self) -> f64 {
        self.start_angle_deg
    }

    pub fn rotation_range_deg(&self) -> f64 {
        self.rotation_range_deg
    }

    pub fn exposure_time_s(&self) -> f64 {
        self.exposure_time_s
    }

    pub fn step_count(&self) -> usize {
        let ratio = self.rotation_range_deg.abs() / self.angular_resolution_deg;
        ((ratio - STEP_COUNT_EPSILON).ceil() as usize).max(1)
    }

    pub fn step(&self, index: usize) -> Option<AngleStep> {
        let n = self.step_count();
        (index < n).then(|| self.make_step(index, n))
    }

    /// Angle steps in acquisition order.
    pub fn steps(&self) -> impl ExactSizeIterator<Item = AngleStep> + '_ {
        let n = self.step_count();
        (0..n).map(move |index| self.make_step(index, n))
    }

    fn make_step(&self, index: usize, n: usize) -> AngleStep {
        AngleStep {
            index,
            angle_deg: self.start_angle_deg
                + self.rotation_range_deg.signum() * index as f64 * self.angular_resolution_deg,
            exposure_s: self.exposure_time_s / n as f64,
        }
    }

    /// Translation of the crystal relative to the beam at a step, in µm.
    pub fn offset_at(&self, step: &AngleStep) -> Vector3<f64> {
        self.start_offset
            + self.translate_per_degree * (step.angle_deg - self.start_angle_deg)
            + Vector3::new(self.rot_ax_beam_offset, 0.0, 0.0)
    }

    /// Position of a crystal-frame point in the beam frame at a step.
    pub fn to_beam_frame(&self, point: &Point3<f64>, step: &AngleStep) -> Point3<f64> {
        to_beam_frame(point, step.angle_rad()) + self.offset_at(step)
    }
}
