//! # Coefficients Module
//!
//! Converts the atomic composition of a crystal into linear interaction coefficients
//! at the current photon energy.
//!
//! ## Overview
//!
//! Each element's expected per-unit-cell count (its *occurrence*) is multiplied by
//! its per-atom cross sections and divided by the cell volume:
//!
//! - **absorption** - photoelectric, the energy actually deposited
//! - **elastic** - coherent (Rayleigh) scattering, the diffracted signal
//! - **inelastic** - incoherent (Compton) scattering
//! - **attenuation** - the sum of all three, used for Beer-Lambert beam attenuation
//!
//! All coefficients are in µm⁻¹.
//!
//! ## Architecture
//!
//! Composition sources implement [`CoefficientSource`]: [`params::ParamsCalculator`]
//! from explicit residue counts and [`sequence::SequenceCalculator`] from
//! sequence-derived element counts. Cross sections are injected through a
//! [`CrossSectionProvider`].

pub mod composition;
#[cfg(any(test, feature = "legacy-reference"))]
pub mod legacy;
pub mod params;
pub mod sequence;

use crate::core::beam::Beam;
use crate::core::data::cross_sections::{CrossSectionProvider, ReferenceDataError};
use composition::{Composition, CompositionError};
use thiserror::Error;
use tracing::trace;

const BARN_TO_SQUARE_ANGSTROM: f64 = 1e-8;
const PER_ANGSTROM_TO_PER_MICRON: f64 = 1e4;

#[derive(Debug, Error)]
pub enum CoefficientError {
    #[error("Coefficients were requested before update_coefficients was called")]
    Uninitialized,
    #[error("Unknown element '{0}'")]
    UnknownElement(String),
    #[error("Photon energy {energy_kev} keV is outside the tabulated range for '{element}'")]
    EnergyOutOfRange { element: String, energy_kev: f64 },
    #[error("Coefficient '{name}' is {value}; coefficients must be finite and non-negative")]
    NumericInvariant { name: &'static str, value: f64 },
    #[error("Invalid composition: {0}")]
    Configuration(#[from] CompositionError),
    #[error("Reference data error: {0}")]
    ReferenceData(ReferenceDataError),
}

impl From<ReferenceDataError> for CoefficientError {
    fn from(err: ReferenceDataError) -> Self {
        match err {
            ReferenceDataError::UnknownElement(element) => CoefficientError::UnknownElement(element),
            ReferenceDataError::EnergyOutOfRange {
                element,
                energy_kev,
                ..
            } => CoefficientError::EnergyOutOfRange {
                element,
                energy_kev,
            },
            other => CoefficientError::ReferenceData(other),
        }
    }
}

/// Linear coefficients (µm⁻¹) and crystal density for one photon energy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoefficientSet {
    pub energy_kev: f64,
    pub absorption: f64,
    pub elastic: f64,
    pub inelastic: f64,
    pub attenuation: f64,
    /// g/ml
    pub density: f64,
}

impl CoefficientSet {
    fn validated(self) -> Result<Self, CoefficientError> {
        let checks = [
            ("absorption", self.absorption),
            ("elastic", self.elastic),
            ("inelastic", self.inelastic),
            ("attenuation", self.attenuation),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CoefficientError::NumericInvariant { name, value });
            }
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(CoefficientError::NumericInvariant {
                name: "density",
                value: self.density,
            });
        }
        Ok(self)
    }
}

pub trait CoefficientSource: Send + Sync {
    fn composition(&self) -> &Composition;

    /// Recomputes the coefficients for the beam's photon energy and caches them.
    fn update_coefficients(&mut self, beam: &Beam) -> Result<CoefficientSet, CoefficientError>;

    /// The most recently computed coefficients.
    fn coefficients(&self) -> Result<&CoefficientSet, CoefficientError>;

    fn absorption_coefficient(&self) -> Result<f64, CoefficientError> {
        Ok(self.coefficients()?.absorption)
    }

    fn elastic_coefficient(&self) -> Result<f64, CoefficientError> {
        Ok(self.coefficients()?.elastic)
    }

    fn attenuation_coefficient(&self) -> Result<f64, CoefficientError> {
        Ok(self.coefficients()?.attenuation)
    }

    fn density(&self) -> Result<f64, CoefficientError> {
        Ok(self.coefficients()?.density)
    }

    fn macromolecular_occurrence(&self, element: &str) -> f64 {
        self.composition().macromolecular_occurrence(element)
    }

    fn solvent_occurrence(&self, element: &str) -> f64 {
        self.composition().solvent_occurrence(element)
    }
}

/// Occurrence-weighted sum of cross sections over every element in the cell.
pub(crate) fn compute_coefficients(
    composition: &Composition,
    provider: &dyn CrossSectionProvider,
    energy_kev: f64,
) -> Result<CoefficientSet, CoefficientError> {
    let scale = BARN_TO_SQUARE_ANGSTROM / composition.cell_volume() * PER_ANGSTROM_TO_PER_MICRON;
    let (mut photoelectric, mut coherent, mut incoherent) = (0.0, 0.0, 0.0);

    for element in composition.elements() {
        let occurrence = composition.occurrence(element);
        if occurrence == 0.0 {
            continue;
        }
        let xs = provider.cross_sections(element, energy_kev)?;
        trace!(element, occurrence, photoelectric = xs.photoelectric, "Element contribution.");
        photoelectric += occurrence * xs.photoelectric;
        coherent += occurrence * xs.coherent;
        incoherent += occurrence * xs.incoherent;
    }

    let absorption = photoelectric * scale;
    let elastic = coherent * scale;
    let inelastic = incoherent * scale;
    CoefficientSet {
        energy_kev,
        absorption,
        elastic,
        inelastic,
        attenuation: absorption + elastic + inelastic,
        density: composition.density_g_per_ml(),
    }
    .validated()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::beam::Collimation;
    use crate::core::data::cross_sections::TabulatedCrossSections;
    use composition::UnitCell;
    use std::collections::BTreeMap;

    pub(crate) const NO_COMPTON_TABLE: &str = "\
element,energy_kev,photoelectric,coherent,incoherent
H,5,0.1,0.4,0
H,15,0.002,0.1,0
O,5,500,20,0
O,15,15,6,0
S,5,9000,90,0
S,15,400,25,0
";

    pub(crate) fn lysozyme_beam() -> Beam {
        Beam::tophat(
            Collimation::Rectangular {
                x_um: 80.0,
                y_um: 80.0,
            },
            9.281e8,
            8.05,
        )
        .unwrap()
    }

    fn water_and_sulfur() -> Composition {
        let cell = UnitCell::orthorhombic(50.0, 50.0, 50.0).unwrap();
        let macromolecule: BTreeMap<String, f64> = [("S".to_string(), 12.0)].into();
        Composition::new(&cell, &macromolecule, &BTreeMap::new(), Some(0.6)).unwrap()
    }

    #[test]
    fn absorption_plus_elastic_equals_attenuation_without_compton_scattering() {
        let provider =
            TabulatedCrossSections::from_reader(NO_COMPTON_TABLE.as_bytes(), "synthetic").unwrap();
        let set = compute_coefficients(&water_and_sulfur(), &provider, 8.0).unwrap();
        assert_eq!(set.inelastic, 0.0);
        assert!((set.absorption + set.elastic - set.attenuation).abs() < 5e-6);
        assert!(set.absorption > 0.0 && set.elastic > 0.0);
    }

    #[test]
    fn coefficients_scale_with_occurrence() {
        let provider =
            TabulatedCrossSections::from_reader(NO_COMPTON_TABLE.as_bytes(), "synthetic").unwrap();
        let composition = water_and_sulfur();
        let set = compute_coefficients(&composition, &provider, 5.0).unwrap();
        let expected = (composition.occurrence("H") * 0.1
            + composition.occurrence("O") * 500.0
            + composition.occurrence("S") * 9000.0)
            * 1e-8
            / composition.cell_volume()
            * 1e4;
        assert!((set.absorption / expected - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_element_in_table_is_unknown_element() {
        let table = "element,energy_kev,photoelectric,coherent,incoherent\nH,5,1,1,1\nH,15,1,1,1\n";
        let provider = TabulatedCrossSections::from_reader(table.as_bytes(), "h-only").unwrap();
        let err = compute_coefficients(&water_and_sulfur(), &provider, 8.0).unwrap_err();
        assert!(matches!(err, CoefficientError::UnknownElement(e) if e == "O"));
    }

    #[test]
    fn energy_outside_table_is_reported_with_element() {
        let provider =
            TabulatedCrossSections::from_reader(NO_COMPTON_TABLE.as_bytes(), "synthetic").unwrap();
        let err = compute_coefficients(&water_and_sulfur(), &provider, 20.0).unwrap_err();
        assert!(matches!(
            err,
            CoefficientError::EnergyOutOfRange { energy_kev, .. } if energy_kev == 20.0
        ));
    }

    #[test]
    fn validated_rejects_nan_and_negative_values() {
        let nan = CoefficientSet {
            absorption: f64::NAN,
            density: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            nan.validated(),
            Err(CoefficientError::NumericInvariant { name: "absorption", .. })
        ));
        let negative = CoefficientSet {
            elastic: -1e-9,
            density: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            negative.validated(),
            Err(CoefficientError::NumericInvariant { name: "elastic", .. })
        ));
    }
}
