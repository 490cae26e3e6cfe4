//! Reference calculator that follows the mass-attenuation route.
//!
//! Cross sections are first turned into per-element mass attenuation coefficients
//! (cm²/g), mixed by mass fraction and multiplied by the crystal density. The result
//! must agree with the direct occurrence sum of the production calculators; it exists
//! only to cross-validate them and is never built by configuration dispatch.

use super::composition::{AVOGADRO, Composition};
use super::params::CompositionParams;
use super::{CoefficientError, CoefficientSet, CoefficientSource};
use crate::core::beam::Beam;
use crate::core::data::cross_sections::CrossSectionProvider;
use crate::core::data::elements;
use std::sync::Arc;

const BARN_TO_SQUARE_CM: f64 = 1e-24;
const PER_CM_TO_PER_MICRON: f64 = 1e-4;

pub struct LegacyCalculator {
    composition: Composition,
    provider: Arc<dyn CrossSectionProvider>,
    current: Option<CoefficientSet>,
}

impl LegacyCalculator {
    pub fn new(
        params: &CompositionParams,
        provider: Arc<dyn CrossSectionProvider>,
    ) -> Result<Self, CoefficientError> {
        Ok(Self {
            composition: params.composition()?,
            provider,
            current: None,
        })
    }
}

impl CoefficientSource for LegacyCalculator {
    fn composition(&self) -> &Composition {
        &self.composition
    }

    fn update_coefficients(&mut self, beam: &Beam) -> Result<CoefficientSet, CoefficientError> {
        let energy_kev = beam.energy_kev();
        let total_mass = self.composition.unit_cell_mass_da();
        let density = self.composition.density_g_per_ml();

        let mut mass_attenuation = [0.0; 3];
        for symbol in self.composition.elements() {
            let element = elements::element(symbol)
                .ok_or_else(|| CoefficientError::UnknownElement(symbol.to_string()))?;
            let occurrence = self.composition.occurrence(symbol);
            let mass_fraction = occurrence * element.atomic_weight / total_mass;
            let xs = self.provider.cross_sections(symbol, energy_kev)?;
            let per_gram = BARN_TO_SQUARE_CM * AVOGADRO / element.atomic_weight;
            for (acc, sigma) in mass_attenuation
                .iter_mut()
                .zip([xs.photoelectric, xs.coherent, xs.incoherent])
            {
                *acc += mass_fraction * sigma * per_gram;
            }
        }

        let [absorption, elastic, inelastic] =
            mass_attenuation.map(|mu_rho| mu_rho * density * PER_CM_TO_PER_MICRON);
        let set = CoefficientSet {
            energy_kev,
            absorption,
            elastic,
            inelastic,
            attenuation: absorption + elastic + inelastic,
            density,
        }
        .validated()?;
        self.current = Some(set);
        Ok(set)
    }

    fn coefficients(&self) -> Result<&CoefficientSet, CoefficientError> {
        self.current.as_ref().ok_or(CoefficientError::Uninitialized)
    }
}
