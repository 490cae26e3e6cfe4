pub struct DefaultsConfig {
    pub angular_resolution_deg: f64,
    pub start_angle_deg: f64,
    pub angle_p_deg: f64,
    pub angle_l_deg: f64,
    pub cell_angle_deg: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            angular_resolution_deg: 2.0,
            start_angle_deg: 0.0,
            angle_p_deg: 0.0,
            angle_l_deg: 0.0,
            cell_angle_deg: 90.0,
        }
    }
}
