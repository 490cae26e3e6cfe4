use nalgebra::{Point3, Rotation3, Unit, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Orientation of a crystal as mounted: `angle_p` about the beam axis (z), then
/// `angle_l` about the horizontal axis (x).
pub fn crystal_orientation(angle_p_deg: f64, angle_l_deg: f64) -> Rotation3<f64> {
    rotation_from_axis_angle(&Vector3::x(), angle_l_deg)
        * rotation_from_axis_angle(&Vector3::z(), angle_p_deg)
}

/// Goniometer rotation about the vertical (y) axis.
pub fn goniometer_rotation(angle_rad: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::y_axis(), angle_rad)
}

/// Direction towards the X-ray source expressed in crystal coordinates.
///
/// The beam travels along +z in the beam frame, so the source lies along -z.
pub fn upstream_direction(angle_rad: f64) -> Vector3<f64> {
    goniometer_rotation(angle_rad).inverse_transform_vector(&-Vector3::z())
}

pub fn to_beam_frame(point: &Point3<f64>, angle_rad: f64) -> Point3<f64> {
    goniometer_rotation(angle_rad) * point
}
