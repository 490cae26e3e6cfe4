use crate::core::data::elements::{self, canonical_symbol};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const AVOGADRO: f64 = 6.022_140_76e23;
/// Unified atomic mass unit in grams.
pub const ATOMIC_MASS_UNIT_G: f64 = 1.660_539_066_60e-24;
pub const PROTEIN_DENSITY_G_PER_ML: f64 = 1.35;
/// Molar concentration of pure water.
pub const WATER_CONCENTRATION_MM: f64 = 55_555.0;

const CUBIC_ANGSTROM_TO_ML: f64 = 1e-24;
const CUBIC_ANGSTROM_TO_LITRE: f64 = 1e-27;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompositionError {
    #[error("Invalid unit cell: {0}")]
    InvalidUnitCell(String),
    #[error("Unknown element '{0}'")]
    UnknownElement(String),
    #[error("Invalid count for '{name}': {value} (must be finite and non-negative)")]
    InvalidCount { name: String, value: f64 },
    #[error("Solvent fraction {0} is outside (0, 1)")]
    SolventFraction(f64),
    #[error("Solute concentrations total {0} mM, more than pure water")]
    ExcessSolute(f64),
}

/// Crystallographic unit cell: edge lengths in Å, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl UnitCell {
    pub fn new(
        a: f64,
        b: f64,
        c: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    ) -> Result<Self, CompositionError> {
        if [a, b, c].iter().any(|l| !(l.is_finite() && *l > 0.0)) {
            return Err(CompositionError::InvalidUnitCell(format!(
                "edge lengths must be positive, got ({a}, {b}, {c})"
            )));
        }
        if [alpha, beta, gamma]
            .iter()
            .any(|x| !(x.is_finite() && *x > 0.0 && *x < 180.0))
        {
            return Err(CompositionError::InvalidUnitCell(format!(
                "angles must lie in (0, 180) degrees, got ({alpha}, {beta}, {gamma})"
            )));
        }
        let cell = Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        };
        if !(cell.volume() > 0.0) {
            return Err(CompositionError::InvalidUnitCell(
                "angles do not describe a real cell".to_string(),
            ));
        }
        Ok(cell)
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, CompositionError> {
        Self::new(a, b, c, 90.0, 90.0, 90.0)
    }

    /// Volume in Å³.
    pub fn volume(&self) -> f64 {
        let (ca, cb, cg) = (
            self.alpha.to_radians().cos(),
            self.beta.to_radians().cos(),
            self.gamma.to_radians().cos(),
        );
        let factor = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        self.a * self.b * self.c * factor.max(0.0).sqrt()
    }
}

/// Expected per-unit-cell element counts for the macromolecule and solvent regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    cell_volume: f64,
    solvent_fraction: f64,
    macromolecule: BTreeMap<&'static str, f64>,
    solvent: BTreeMap<&'static str, f64>,
}

impl Composition {
    /// Builds the composition of a unit cell.
    ///
    /// `macromolecule` holds per-cell atom counts; `solutes_mm` holds solvent
    /// concentrations in mM. Without an explicit positive `solvent_fraction`, the
    /// fraction is derived from the macromolecular mass at protein density.
    pub fn new(
        unit_cell: &UnitCell,
        macromolecule: &BTreeMap<String, f64>,
        solutes_mm: &BTreeMap<String, f64>,
        solvent_fraction: Option<f64>,
    ) -> Result<Self, CompositionError> {
        let cell_volume = unit_cell.volume();
        let macromolecule = resolve_counts(macromolecule)?;
        let solutes = resolve_counts(solutes_mm)?;

        let macromolecular_mass: f64 = mass_da(&macromolecule);
        let solvent_fraction = match solvent_fraction {
            Some(fraction) if fraction > 0.0 => fraction,
            _ => {
                let protein_volume_ml =
                    macromolecular_mass * ATOMIC_MASS_UNIT_G / PROTEIN_DENSITY_G_PER_ML;
                1.0 - protein_volume_ml / (cell_volume * CUBIC_ANGSTROM_TO_ML)
            }
        };
        if !(solvent_fraction > 0.0 && solvent_fraction < 1.0) {
            return Err(CompositionError::SolventFraction(solvent_fraction));
        }

        let solute_total: f64 = solutes.values().sum();
        if solute_total > WATER_CONCENTRATION_MM {
            return Err(CompositionError::ExcessSolute(solute_total));
        }

        let solvent_volume_l = cell_volume * solvent_fraction * CUBIC_ANGSTROM_TO_LITRE;
        let atoms_per_mm = 1e-3 * AVOGADRO * solvent_volume_l;
        let mut solvent: BTreeMap<&'static str, f64> = solutes
            .into_iter()
            .map(|(symbol, mm)| (symbol, mm * atoms_per_mm))
            .collect();
        let water_molecules = (WATER_CONCENTRATION_MM - solute_total) * atoms_per_mm;
        *solvent.entry("H").or_default() += 2.0 * water_molecules;
        *solvent.entry("O").or_default() += water_molecules;

        Ok(Self {
            cell_volume,
            solvent_fraction,
            macromolecule,
            solvent,
        })
    }

    /// Unit-cell volume in Å³.
    pub fn cell_volume(&self) -> f64 {
        self.cell_volume
    }

    pub fn solvent_fraction(&self) -> f64 {
        self.solvent_fraction
    }

    pub fn macromolecular_occurrence(&self, element: &str) -> f64 {
        lookup(&self.macromolecule, element)
    }

    pub fn solvent_occurrence(&self, element: &str) -> f64 {
        lookup(&self.solvent, element)
    }

    pub fn occurrence(&self, element: &str) -> f64 {
        self.macromolecular_occurrence(element) + self.solvent_occurrence(element)
    }

    /// Every element present in either region, in symbol order.
    pub fn elements(&self) -> impl Iterator<Item = &'static str> {
        self.macromolecule
            .keys()
            .chain(self.solvent.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
    }

    pub fn macromolecular_mass_da(&self) -> f64 {
        mass_da(&self.macromolecule)
    }

    pub fn unit_cell_mass_da(&self) -> f64 {
        mass_da(&self.macromolecule) + mass_da(&self.solvent)
    }

    pub fn density_g_per_ml(&self) -> f64 {
        self.unit_cell_mass_da() * ATOMIC_MASS_UNIT_G / (self.cell_volume * CUBIC_ANGSTROM_TO_ML)
    }
}

fn resolve_counts(
    counts: &BTreeMap<String, f64>,
) -> Result<BTreeMap<&'static str, f64>, CompositionError> {
    let mut resolved = BTreeMap::new();
    for (symbol, &count) in counts {
        let element = elements::element(symbol)
            .ok_or_else(|| CompositionError::UnknownElement(canonical_symbol(symbol)))?;
        if !(count.is_finite() && count >= 0.0) {
            return Err(CompositionError::InvalidCount {
                name: element.symbol.to_string(),
                value: count,
            });
        }
        *resolved.entry(element.symbol).or_default() += count;
    }
    Ok(resolved)
}

fn mass_da(counts: &BTreeMap<&'static str, f64>) -> f64 {
    counts
        .iter()
        .filter_map(|(symbol, n)| elements::element(symbol).map(|e| n * e.atomic_weight))
        .sum()
}

fn lookup(counts: &BTreeMap<&'static str, f64>, element: &str) -> f64 {
    counts
        .get(canonical_symbol(element).as_str())
        .copied()
        .unwrap_or(0.0)
}
