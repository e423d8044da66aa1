use std::fmt;
use std::str::FromStr;

use crate::error::Is2Error;

/// Ground tracks of the ATLAS instrument, three pairs of left/right beams
pub const BEAMS: [&str; 6] = ["gt1l", "gt1r", "gt2l", "gt2r", "gt3l", "gt3r"];

/// A column read from every beam group of a granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Column name in the loaded table
    pub name: &'static str,
    /// Dataset path relative to the beam group
    pub path: &'static str,
}

const fn field(name: &'static str, path: &'static str) -> Field {
    Field { name, path }
}

const ATL03_FIELDS: &[Field] = &[
    field("delta_time", "heights/delta_time"),
    field("latitude", "heights/lat_ph"),
    field("longitude", "heights/lon_ph"),
    field("dist_ph_along", "heights/dist_ph_along"),
    field("h_ph", "heights/h_ph"),
];

const ATL06_FIELDS: &[Field] = &[
    field("delta_time", "land_ice_segments/delta_time"),
    field("latitude", "land_ice_segments/latitude"),
    field("longitude", "land_ice_segments/longitude"),
    field("h_li", "land_ice_segments/h_li"),
];

const ATL08_FIELDS: &[Field] = &[
    field("delta_time", "land_segments/delta_time"),
    field("latitude", "land_segments/latitude"),
    field("longitude", "land_segments/longitude"),
    field("h_canopy", "land_segments/canopy/h_canopy"),
    field("h_te_mean", "land_segments/terrain/h_te_mean"),
    field("h_te_interp", "land_segments/terrain/h_te_interp"),
];

/// Supported ICESat-2 data products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    /// Global geolocated photon data
    Atl03,
    /// Land ice height
    Atl06,
    /// Land and vegetation height
    Atl08,
}

impl Product {
    pub const ALL: [Product; 3] = [Product::Atl03, Product::Atl06, Product::Atl08];

    pub fn short_name(&self) -> &'static str {
        match self {
            Product::Atl03 => "ATL03",
            Product::Atl06 => "ATL06",
            Product::Atl08 => "ATL08",
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self {
            Product::Atl03 => ATL03_FIELDS,
            Product::Atl06 => ATL06_FIELDS,
            Product::Atl08 => ATL08_FIELDS,
        }
    }
}

impl FromStr for Product {
    type Err = Is2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        Product::ALL
            .into_iter()
            .find(|p| p.short_name() == trimmed)
            .ok_or_else(|| Is2Error::UnsupportedProduct(trimmed.to_string()))
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
