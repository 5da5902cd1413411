//! Discrete setting catalogs and nearest-value quantization.
//!
//! Consumer cameras expose tunable parameters (shutter speed,
//! sensitivity) as a fixed list of textual choices. This module parses
//! those choices into an ordered numeric table and resolves arbitrary
//! requested values to the nearest choice the hardware accepts.

mod catalog;

pub use catalog::{CatalogError, SettingCatalog};
