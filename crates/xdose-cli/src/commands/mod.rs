pub mod coefficients;
pub mod run;

use crate::error::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use xdose::core::data::cross_sections::{CrossSectionProvider, TabulatedCrossSections};
use xdose::engine::error::EngineError;

fn load_cross_sections(path: Option<&Path>) -> Result<Arc<dyn CrossSectionProvider>> {
    let table = match path {
        Some(path) => {
            info!("Loading cross sections from {:?}", path);
            TabulatedCrossSections::load(path)
        }
        None => TabulatedCrossSections::bundled(),
    }
    .map_err(EngineError::from)?;
    Ok(Arc::new(table))
}
