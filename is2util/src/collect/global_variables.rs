/// NSIDC EGI order endpoint
pub const EGI_URL: &str = "https://n5eil02u.ecs.nsidc.org/egi/request";

/// Geographic CRS used for every geometry sent to the order API
pub const GEOG_EPSG: u32 = 4326;

pub const DEFAULT_SHORT_NAME: &str = "ATL06";
pub const DEFAULT_VERSION: &str = "001";

/// Fixed page size for shapefile upload orders
pub const PAGE_SIZE: u32 = 2000;

pub const SUBAGENT_ID: &str = "ICESAT2";
