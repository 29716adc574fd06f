use serde::{Deserialize, Serialize};

use crate::grib::grid::MIN_TOLERANCE;

/// Knobs of the decoder. Every field has a default so partial YAML files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecoderConfig {
    /// Compensates the one octet bitmap length error of ECMWF edition 1 files.
    pub ecmwf_bitmap_workaround: bool,
    /// Checks that enumerating a grid ends on its declared last point.
    pub check_geometry: bool,
    /// Smallest closure tolerance, in degrees.
    pub geometry_tolerance: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ecmwf_bitmap_workaround: true,
            check_geometry: true,
            geometry_tolerance: MIN_TOLERANCE,
        }
    }
}

#[derive(Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub decoder: DecoderConfig,
}
