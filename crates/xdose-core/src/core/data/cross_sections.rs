use super::elements::canonical_symbol;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Photoelectric, coherent and incoherent cross sections for 28 elements, 1-100 keV.
const BUNDLED_TABLE: &str = include_str!("../../../data/cross_sections.csv");

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid cross-section table '{path}': {reason}")]
    InvalidTable { path: String, reason: String },
    #[error("No cross-section data for element '{0}'")]
    UnknownElement(String),
    #[error("Energy {energy_kev} keV is outside the tabulated range [{min_kev}, {max_kev}] keV for '{element}'")]
    EnergyOutOfRange {
        element: String,
        energy_kev: f64,
        min_kev: f64,
        max_kev: f64,
    },
}

/// Per-atom interaction cross sections in barns.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrossSections {
    pub photoelectric: f64,
    pub coherent: f64,
    pub incoherent: f64,
}

pub trait CrossSectionProvider: Send + Sync {
    fn cross_sections(
        &self,
        element: &str,
        energy_kev: f64,
    ) -> Result<CrossSections, ReferenceDataError>;
}

#[derive(Debug, Clone, Deserialize)]
struct CrossSectionRecord {
    element: String,
    energy_kev: f64,
    photoelectric: f64,
    coherent: f64,
    incoherent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TablePoint {
    energy_kev: f64,
    values: CrossSections,
}

/// Cross sections interpolated log-log from a CSV table.
///
/// Rows are `element,energy_kev,photoelectric,coherent,incoherent`, grouped by
/// element in ascending energy. An absorption edge is written as two rows with the
/// same energy, the below-edge row first; the above-edge values apply at the edge.
#[derive(Debug, Clone)]
pub struct TabulatedCrossSections {
    tables: HashMap<String, Vec<TablePoint>>,
}

impl TabulatedCrossSections {
    pub fn bundled() -> Result<Self, ReferenceDataError> {
        Self::from_reader(BUNDLED_TABLE.as_bytes(), "<bundled>")
    }

    pub fn load(path: &Path) -> Result<Self, ReferenceDataError> {
        let file = std::fs::File::open(path).map_err(|e| ReferenceDataError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_reader(file, &path.to_string_lossy())
    }

    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self, ReferenceDataError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut tables: HashMap<String, Vec<TablePoint>> = HashMap::new();

        for result in reader.deserialize() {
            let record: CrossSectionRecord = result.map_err(|e| ReferenceDataError::Csv {
                path: source_name.to_string(),
                source: e,
            })?;
            let values = CrossSections {
                photoelectric: record.photoelectric,
                coherent: record.coherent,
                incoherent: record.incoherent,
            };
            let valid = record.energy_kev.is_finite()
                && record.energy_kev > 0.0
                && [values.photoelectric, values.coherent, values.incoherent]
                    .iter()
                    .all(|v| v.is_finite() && *v >= 0.0);
            if !valid {
                return Err(ReferenceDataError::InvalidTable {
                    path: source_name.to_string(),
                    reason: format!(
                        "row for '{}' at {} keV has a non-positive energy or a negative value",
                        record.element, record.energy_kev
                    ),
                });
            }

            let points = tables.entry(canonical_symbol(&record.element)).or_default();
            if let Some(last) = points.last() {
                if record.energy_kev < last.energy_kev {
                    return Err(ReferenceDataError::InvalidTable {
                        path: source_name.to_string(),
                        reason: format!("energies for '{}' are not ascending", record.element),
                    });
                }
            }
            points.push(TablePoint {
                energy_kev: record.energy_kev,
                values,
            });
        }

        if tables.is_empty() {
            return Err(ReferenceDataError::InvalidTable {
                path: source_name.to_string(),
                reason: "table contains no rows".to_string(),
            });
        }
        Ok(Self { tables })
    }

    /// Tabulated energy range for an element, in keV.
    pub fn energy_range(&self, element: &str) -> Option<(f64, f64)> {
        let points = self.tables.get(&canonical_symbol(element))?;
        Some((points.first()?.energy_kev, points.last()?.energy_kev))
    }
}

impl CrossSectionProvider for TabulatedCrossSections {
    fn cross_sections(
        &self,
        element: &str,
        energy_kev: f64,
    ) -> Result<CrossSections, ReferenceDataError> {
        let symbol = canonical_symbol(element);
        let points = self
            .tables
            .get(&symbol)
            .ok_or_else(|| ReferenceDataError::UnknownElement(symbol.clone()))?;
        let (min_kev, max_kev) = self
            .energy_range(&symbol)
            .ok_or_else(|| ReferenceDataError::UnknownElement(symbol.clone()))?;
        if !(min_kev..=max_kev).contains(&energy_kev) {
            return Err(ReferenceDataError::EnergyOutOfRange {
                element: symbol,
                energy_kev,
                min_kev,
                max_kev,
            });
        }

        let idx = points.partition_point(|p| p.energy_kev <= energy_kev);
        if idx == points.len() {
            return Ok(points[idx - 1].values);
        }
        let (lower, upper) = (&points[idx - 1], &points[idx]);
        let interpolate = |a: f64, b: f64| {
            log_log_interpolate(lower.energy_kev, a, upper.energy_kev, b, energy_kev)
        };
        Ok(CrossSections {
            photoelectric: interpolate(lower.values.photoelectric, upper.values.photoelectric),
            coherent: interpolate(lower.values.coherent, upper.values.coherent),
            incoherent: interpolate(lower.values.incoherent, upper.values.incoherent),
        })
    }
}

/// Power-law interpolation; falls back to linear when either endpoint is zero.
fn log_log_interpolate(e0: f64, v0: f64, e1: f64, v1: f64, e: f64) -> f64 {
    if e == e0 {
        return v0;
    }
    if v0 > 0.0 && v1 > 0.0 {
        v0 * ((v1 / v0).ln() * (e / e0).ln() / (e1 / e0).ln()).exp()
    } else {
        v0 + (v1 - v0) * (e - e0) / (e1 - e0)
    }
}
