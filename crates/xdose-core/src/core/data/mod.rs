//! Reference data: static element properties and tabulated photon cross sections.

pub mod cross_sections;
pub mod elements;
