//! Slide property table.
//!
//! A fixed set of four properties, filled once from the vendor header. Values
//! are kept as C strings so the C ABI can hand out pointers that stay valid
//! while the slide is open.

use std::ffi::{CStr, CString};

use crate::vendor::HeaderInfo;

pub const PROPERTY_MPP_X: &str = "openslide.mpp-x";
pub const PROPERTY_MPP_T: &str = "openslide.mpp-t";
pub const PROPERTY_VENDOR: &str = "openslide.vendor";
pub const PROPERTY_SCAN_SCALE: &str = "scanScale";

/// Property names in table order.
pub const PROPERTY_NAMES: [&str; 4] = [
    PROPERTY_MPP_X,
    PROPERTY_MPP_T,
    PROPERTY_VENDOR,
    PROPERTY_SCAN_SCALE,
];

/// [`PROPERTY_NAMES`] as C strings.
pub const PROPERTY_C_NAMES: [&CStr; 4] = [
    c"openslide.mpp-x",
    c"openslide.mpp-t",
    c"openslide.vendor",
    c"scanScale",
];

/// Value reported for `openslide.vendor`.
pub const VENDOR_NAME: &str = "Kfbio";

/// Immutable name/value table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTable {
    /// Values indexed like [`PROPERTY_NAMES`]
    values: [CString; 4],
}

impl PropertyTable {
    /// Build the table from a vendor header.
    ///
    /// Microns-per-pixel are rendered with six decimals; the vendor reports a
    /// single capture resolution, used for both mpp keys.
    pub fn from_header(header: &HeaderInfo) -> Self {
        let mpp = format!("{:.6}", header.cap_res as f64);
        Self {
            values: [
                c_string(mpp.clone()),
                c_string(mpp),
                c_string(VENDOR_NAME.to_string()),
                c_string(header.scan_scale.to_string()),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Property names in stable insertion order.
    pub fn names(&self) -> &'static [&'static str] {
        &PROPERTY_NAMES
    }

    /// Look up a property value.
    pub fn value(&self, name: &str) -> Option<&str> {
        let index = PROPERTY_NAMES.iter().position(|n| *n == name)?;
        self.values[index].to_str().ok()
    }

    /// Look up a property value by C name.
    pub fn c_value(&self, name: &CStr) -> Option<&CStr> {
        let index = PROPERTY_C_NAMES.iter().position(|n| *n == name)?;
        Some(self.values[index].as_c_str())
    }

    /// Iterate `(name, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        PROPERTY_NAMES
            .iter()
            .zip(self.values.iter())
            .filter_map(|(name, value)| Some((*name, value.to_str().ok()?)))
    }
}

// Values are produced by formatting numbers, so they never contain NUL.
fn c_string(value: String) -> CString {
    CString::new(value).unwrap_or_default()
}
