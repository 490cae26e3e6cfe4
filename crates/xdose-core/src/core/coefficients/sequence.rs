use super::composition::{Composition, CompositionError, UnitCell};
use super::params::SolventParams;
use super::{CoefficientError, CoefficientSet, CoefficientSource, compute_coefficients};
use crate::core::beam::Beam;
use crate::core::data::cross_sections::CrossSectionProvider;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Composition from exact per-monomer element counts, as produced by a sequence
/// or structure parser, instead of average residue content.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceComposition {
    pub unit_cell: UnitCell,
    pub num_monomers: u32,
    pub monomer_elements: BTreeMap<String, f64>,
    pub heavy_atoms_per_monomer: BTreeMap<String, f64>,
    pub solvent: SolventParams,
}

impl SequenceComposition {
    pub fn element_counts(&self) -> BTreeMap<String, f64> {
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for (symbol, &n) in self
            .monomer_elements
            .iter()
            .chain(&self.heavy_atoms_per_monomer)
        {
            *counts.entry(symbol.clone()).or_default() += n * self.num_monomers as f64;
        }
        counts
    }

    pub fn composition(&self) -> Result<Composition, CompositionError> {
        Composition::new(
            &self.unit_cell,
            &self.element_counts(),
            &self.solvent.concentrations_mm,
            self.solvent.solvent_fraction,
        )
    }
}

pub struct SequenceCalculator {
    composition: Composition,
    provider: Arc<dyn CrossSectionProvider>,
    current: Option<CoefficientSet>,
}

impl SequenceCalculator {
    pub fn new(
        sequence: &SequenceComposition,
        provider: Arc<dyn CrossSectionProvider>,
    ) -> Result<Self, CoefficientError> {
        if sequence.monomer_elements.is_empty() {
            return Err(CompositionError::InvalidCount {
                name: "monomer_elements".to_string(),
                value: 0.0,
            }
            .into());
        }
        let composition = sequence.composition()?;
        debug!(
            elements = sequence.monomer_elements.len(),
            solvent_fraction = composition.solvent_fraction(),
            "Composition resolved from sequence."
        );
        Ok(Self {
            composition,
            provider,
            current: None,
        })
    }
}

impl CoefficientSource for SequenceCalculator {
    fn composition(&self) -> &Composition {
        &self.composition
    }

    fn update_coefficients(&mut self, beam: &Beam) -> Result<CoefficientSet, CoefficientError> {
        let set =
            compute_coefficients(&self.composition, self.provider.as_ref(), beam.energy_kev())?;
        self.current = Some(set);
        Ok(set)
    }

    fn coefficients(&self) -> Result<&CoefficientSet, CoefficientError> {
        self.current.as_ref().ok_or(CoefficientError::Uninitialized)
    }
}
