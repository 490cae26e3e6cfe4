use super::composition::{Composition, CompositionError, UnitCell};
use super::{CoefficientError, CoefficientSet, CoefficientSource, compute_coefficients};
use crate::core::beam::Beam;
use crate::core::data::cross_sections::CrossSectionProvider;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Average element content of one amino-acid residue.
#[rustfmt::skip]
pub const AMINO_ACID_RESIDUE: [(&str, f64); 4] = [
    ("C", 5.0), ("N", 1.35), ("O", 1.5), ("H", 8.0),
];

#[rustfmt::skip]
pub const RNA_NUCLEOTIDE: [(&str, f64); 5] = [
    ("C", 9.5), ("N", 3.75), ("O", 7.0), ("H", 11.75), ("P", 1.0),
];

#[rustfmt::skip]
pub const DNA_NUCLEOTIDE: [(&str, f64); 5] = [
    ("C", 9.75), ("N", 4.0), ("O", 6.0), ("H", 11.75), ("P", 1.0),
];

/// Macromolecule described per monomer (asymmetric-unit copy).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacromoleculeParams {
    pub num_monomers: u32,
    pub residues_per_monomer: u32,
    pub rna_per_monomer: u32,
    pub dna_per_monomer: u32,
    /// Heavy atoms per monomer, on top of the average residue content.
    pub heavy_atoms_per_monomer: BTreeMap<String, f64>,
}

impl MacromoleculeParams {
    /// Per-unit-cell atom counts.
    pub fn element_counts(&self) -> BTreeMap<String, f64> {
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        let mut add = |symbol: &str, n: f64| {
            *counts.entry(symbol.to_string()).or_default() += n * self.num_monomers as f64;
        };
        for (symbol, n) in AMINO_ACID_RESIDUE {
            add(symbol, n * self.residues_per_monomer as f64);
        }
        for (symbol, n) in RNA_NUCLEOTIDE {
            add(symbol, n * self.rna_per_monomer as f64);
        }
        for (symbol, n) in DNA_NUCLEOTIDE {
            add(symbol, n * self.dna_per_monomer as f64);
        }
        for (symbol, &n) in &self.heavy_atoms_per_monomer {
            add(symbol, n);
        }
        counts.retain(|_, n| *n != 0.0);
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolventParams {
    /// Solute concentrations in mM, keyed by element symbol.
    pub concentrations_mm: BTreeMap<String, f64>,
    /// Fraction of the unit cell occupied by solvent; derived when `None`.
    pub solvent_fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionParams {
    pub unit_cell: UnitCell,
    pub macromolecule: MacromoleculeParams,
    pub solvent: SolventParams,
}

impl CompositionParams {
    pub fn composition(&self) -> Result<Composition, CompositionError> {
        Composition::new(
            &self.unit_cell,
            &self.macromolecule.element_counts(),
            &self.solvent.concentrations_mm,
            self.solvent.solvent_fraction,
        )
    }
}

/// Coefficients from explicit residue, nucleotide and heavy-atom counts.
pub struct ParamsCalculator {
    composition: Composition,
    provider: Arc<dyn CrossSectionProvider>,
    current: Option<CoefficientSet>,
}

impl ParamsCalculator {
    pub fn new(
        params: &CompositionParams,
        provider: Arc<dyn CrossSectionProvider>,
    ) -> Result<Self, CoefficientError> {
        let composition = params.composition()?;
        debug!(
            solvent_fraction = composition.solvent_fraction(),
            cell_volume = composition.cell_volume(),
            "Composition resolved from parameters."
        );
        Ok(Self {
            composition,
            provider,
            current: None,
        })
    }
}

impl CoefficientSource for ParamsCalculator {
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
