/// Relative diffraction efficiency of crystal material as a function of absorbed dose.
///
/// Used to weight the diffraction-weighted dose: heavily damaged regions diffract less
/// and contribute less to the measured data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DecayModel {
    /// No decay; every voxel diffracts at full strength.
    #[default]
    Simple,
    /// Efficiency falls linearly, reaching one half at `half_dose_mgy`.
    Linear { half_dose_mgy: f64 },
    /// Efficiency halves every `half_dose_mgy`.
    Exponential { half_dose_mgy: f64 },
}

impl DecayModel {
    pub fn relative_efficiency(&self, dose_mgy: f64) -> f64 {
        match *self {
            DecayModel::Simple => 1.0,
            DecayModel::Linear { half_dose_mgy } => {
                (1.0 - dose_mgy / half_dose_mgy * 0.5).max(0.0)
            }
            DecayModel::Exponential { half_dose_mgy } => (-dose_mgy / half_dose_mgy).exp2(),
        }
    }

    pub fn half_dose_mgy(&self) -> Option<f64> {
        match *self {
            DecayModel::Simple => None,
            DecayModel::Linear { half_dose_mgy } | DecayModel::Exponential { half_dose_mgy } => {
                Some(half_dose_mgy)
            }
        }
    }
}
