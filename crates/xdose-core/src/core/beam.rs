use std::f64::consts::PI;
use thiserror::Error;

/// Energy of a 1 keV photon in joules.
pub const KEV_TO_JOULES: f64 = 1.602_176_634e-16;

/// `2·sqrt(2·ln 2)`, the FWHM of a unit-σ Gaussian.
const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BeamError {
    #[error("Invalid beam parameter '{name}': {value} (must be positive and finite)")]
    InvalidParameter { name: &'static str, value: f64 },
}

fn positive(name: &'static str, value: f64) -> Result<f64, BeamError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(BeamError::InvalidParameter { name, value })
    }
}

/// Beam-defining aperture, given as full widths in µm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collimation {
    Rectangular { x_um: f64, y_um: f64 },
    Elliptical { x_um: f64, y_um: f64 },
}

impl Collimation {
    fn validate(self) -> Result<Self, BeamError> {
        let (Collimation::Rectangular { x_um, y_um } | Collimation::Elliptical { x_um, y_um }) =
            self;
        positive("collimation_x", x_um)?;
        positive("collimation_y", y_um)?;
        Ok(self)
    }

    pub fn area(&self) -> f64 {
        match *self {
            Collimation::Rectangular { x_um, y_um } => x_um * y_um,
            Collimation::Elliptical { x_um, y_um } => PI * x_um * y_um / 4.0,
        }
    }

    pub fn admits(&self, x: f64, y: f64) -> bool {
        match *self {
            Collimation::Rectangular { x_um, y_um } => {
                x.abs() <= x_um / 2.0 && y.abs() <= y_um / 2.0
            }
            Collimation::Elliptical { x_um, y_um } => {
                let (a, b) = (x_um / 2.0, y_um / 2.0);
                (x / a).powi(2) + (y / b).powi(2) <= 1.0
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeamProfile {
    /// Uniform intensity across the aperture.
    Tophat { collimation: Collimation },
    Gaussian {
        fwhm_x_um: f64,
        fwhm_y_um: f64,
        collimation: Option<Collimation>,
    },
}

/// An X-ray beam travelling along +z of the beam frame, centred on the rotation axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    profile: BeamProfile,
    flux: f64,
    energy_kev: f64,
    /// Photons/µm²/s at the beam centre.
    peak_intensity: f64,
}

impl Beam {
    pub fn tophat(collimation: Collimation, flux: f64, energy_kev: f64) -> Result<Self, BeamError> {
        Self::build(
            BeamProfile::Tophat {
                collimation: collimation.validate()?,
            },
            flux,
            energy_kev,
        )
    }

    pub fn gaussian(
        fwhm_x_um: f64,
        fwhm_y_um: f64,
        collimation: Option<Collimation>,
        flux: f64,
        energy_kev: f64,
    ) -> Result<Self, BeamError> {
        Self::build(
            BeamProfile::Gaussian {
                fwhm_x_um: positive("fwhm_x", fwhm_x_um)?,
                fwhm_y_um: positive("fwhm_y", fwhm_y_um)?,
                collimation: collimation.map(Collimation::validate).transpose()?,
            },
            flux,
            energy_kev,
        )
    }

    fn build(profile: BeamProfile, flux: f64, energy_kev: f64) -> Result<Self, BeamError> {
        let flux = positive("flux", flux)?;
        let energy_kev = positive("energy", energy_kev)?;
        let peak_intensity = match profile {
            BeamProfile::Tophat { collimation } => flux / collimation.area(),
            BeamProfile::Gaussian {
                fwhm_x_um,
                fwhm_y_um,
                collimation,
            } => {
                let (sx, sy) = (fwhm_x_um / FWHM_PER_SIGMA, fwhm_y_um / FWHM_PER_SIGMA);
                let transmitted = match collimation {
                    Some(Collimation::Rectangular { x_um, y_um }) => {
                        erf(x_um / (2.0 * 2f64.sqrt() * sx)) * erf(y_um / (2.0 * 2f64.sqrt() * sy))
                    }
                    _ => 1.0,
                };
                flux / (2.0 * PI * sx * sy * transmitted)
            }
        };
        Ok(Self {
            profile,
            flux,
            energy_kev,
            peak_intensity,
        })
    }

    pub fn profile(&self) -> &BeamProfile {
        &self.profile
    }

    /// Photons per second.
    pub fn flux(&self) -> f64 {
        self.flux
    }

    pub fn energy_kev(&self) -> f64 {
        self.energy_kev
    }

    pub fn photon_energy_joules(&self) -> f64 {
        self.energy_kev * KEV_TO_JOULES
    }

    pub fn with_energy(&self, energy_kev: f64) -> Result<Self, BeamError> {
        Self::build(self.profile, self.flux, energy_kev)
    }

    /// Photons/µm²/s at beam-frame position `(x, y)` in µm.
    pub fn intensity(&self, x: f64, y: f64) -> f64 {
        match self.profile {
            BeamProfile::Tophat { collimation } => {
                if collimation.admits(x, y) {
                    self.peak_intensity
                } else {
                    0.0
                }
            }
            BeamProfile::Gaussian {
                fwhm_x_um,
                fwhm_y_um,
                collimation,
            } => {
                if collimation.is_some_and(|c| !c.admits(x, y)) {
                    return 0.0;
                }
                let (sx, sy) = (fwhm_x_um / FWHM_PER_SIGMA, fwhm_y_um / FWHM_PER_SIGMA);
                self.peak_intensity
                    * (-(x * x) / (2.0 * sx * sx) - (y * y) / (2.0 * sy * sy)).exp()
            }
        }
    }
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrate(beam: &Beam, half_width: f64, step: f64) -> f64 {
        let n = (2.0 * half_width / step).round() as i64;
        let mut total = 0.0;
        for i in 0..n {
            for j in 0..n {
                let x = -half_width + (i as f64 + 0.5) * step;
                let y = -half_width + (j as f64 + 0.5) * step;
                total += beam.intensity(x, y) * step * step;
            }
        }
        total
    }

    #[test]
    fn erf_matches_reference_values() {
        assert!(erf(0.0).abs() < 1e-8);
        assert!((erf(1.0) - 0.842_700_792_9).abs() < 2e-7);
        assert!((erf(-0.5) + 0.520_499_877_8).abs() < 2e-7);
        assert!((erf(6.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tophat_is_uniform_inside_and_zero_outside() {
        let beam = Beam::tophat(
            Collimation::Rectangular {
                x_um: 80.0,
                y_um: 40.0,
            },
            3.2e9,
            12.4,
        )
        .unwrap();
        assert!((beam.intensity(0.0, 0.0) - 1e6).abs() < 1e-6);
        assert_eq!(beam.intensity(39.0, -19.0), beam.intensity(0.0, 0.0));
        assert_eq!(beam.intensity(41.0, 0.0), 0.0);
        assert_eq!(beam.intensity(0.0, 21.0), 0.0);
    }

    #[test]
    fn elliptical_tophat_uses_ellipse_area() {
        let beam = Beam::tophat(
            Collimation::Elliptical {
                x_um: 20.0,
                y_um: 10.0,
            },
            PI * 50.0,
            10.0,
        )
        .unwrap();
        assert!((beam.intensity(0.0, 0.0) - 1.0).abs() < 1e-12);
        assert_eq!(beam.intensity(9.0, 4.0), 0.0);
    }

    #[test]
    fn gaussian_peak_and_half_maximum() {
        let beam = Beam::gaussian(20.0, 10.0, None, 1e10, 12.4).unwrap();
        let sx = 20.0 / FWHM_PER_SIGMA;
        let sy = 10.0 / FWHM_PER_SIGMA;
        let peak = beam.intensity(0.0, 0.0);
        assert!((peak - 1e10 / (2.0 * PI * sx * sy)).abs() / peak < 1e-12);
        assert!((beam.intensity(10.0, 0.0) / peak - 0.5).abs() < 1e-9);
        assert!((beam.intensity(0.0, -5.0) / peak - 0.5).abs() < 1e-9);
    }

    #[test]
    fn gaussian_integrates_to_flux() {
        let beam = Beam::gaussian(20.0, 20.0, None, 1e9, 12.4).unwrap();
        let total = integrate(&beam, 60.0, 0.25);
        assert!((total / 1e9 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn rectangular_collimation_renormalises_transmitted_flux() {
        let collimation = Collimation::Rectangular {
            x_um: 20.0,
            y_um: 20.0,
        };
        let beam = Beam::gaussian(30.0, 30.0, Some(collimation), 1e9, 12.4).unwrap();
        assert_eq!(beam.intensity(10.5, 0.0), 0.0);
        let total = integrate(&beam, 10.0, 0.05);
        assert!((total / 1e9 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn elliptical_collimation_truncates_gaussian() {
        let collimation = Collimation::Elliptical {
            x_um: 20.0,
            y_um: 20.0,
        };
        let open = Beam::gaussian(30.0, 30.0, None, 1e9, 12.4).unwrap();
        let truncated = Beam::gaussian(30.0, 30.0, Some(collimation), 1e9, 12.4).unwrap();
        assert_eq!(truncated.intensity(0.0, 0.0), open.intensity(0.0, 0.0));
        assert_eq!(truncated.intensity(0.0, 11.0), 0.0);
    }

    #[test]
    fn constructors_reject_invalid_parameters() {
        let collimation = Collimation::Rectangular {
            x_um: 10.0,
            y_um: 10.0,
        };
        assert_eq!(
            Beam::tophat(collimation, 0.0, 12.4),
            Err(BeamError::InvalidParameter {
                name: "flux",
                value: 0.0
            })
        );
        assert!(Beam::tophat(collimation, 1e9, -1.0).is_err());
        assert!(Beam::gaussian(0.0, 10.0, None, 1e9, 12.4).is_err());
        assert!(
            Beam::tophat(
                Collimation::Elliptical {
                    x_um: 10.0,
                    y_um: f64::INFINITY
                },
                1e9,
                12.4
            )
            .is_err()
        );
    }

    #[test]
    fn with_energy_keeps_profile_and_flux() {
        let beam = Beam::gaussian(20.0, 20.0, None, 1e9, 12.4).unwrap();
        let shifted = beam.with_energy(9.0).unwrap();
        assert_eq!(shifted.energy_kev(), 9.0);
        assert_eq!(shifted.intensity(3.0, 4.0), beam.intensity(3.0, 4.0));
        assert!((shifted.photon_energy_joules() - 9.0 * KEV_TO_JOULES).abs() < 1e-30);
    }
}
