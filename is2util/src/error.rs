use std::path::PathBuf;
use thiserror::Error;

/// Domain errors raised by is2util
/// Public functions return `anyhow::Result`; these can be recovered with `downcast_ref`
#[derive(Error, Debug)]
pub enum Is2Error {
    #[error("{call} returned HTTP {status}: {body}")]
    Http {
        call: &'static str,
        status: u16,
        body: String,
    },

    #[error("expected exactly one order/orderId in response, found {found}")]
    MalformedResponse { found: usize },

    #[error("unable to simplify polygon below {limit} characters after {attempts} attempts")]
    SimplificationBudgetExceeded { limit: usize, attempts: usize },

    #[error("polygon has no exterior ring")]
    NoExteriorRing,

    #[error("expected a polygon, got {0}")]
    NotAPolygon(&'static str),

    #[error("attribute {attribute} not found in {path}")]
    MissingAttribute { attribute: &'static str, path: PathBuf },

    #[error("unsupported product type {0:?}")]
    UnsupportedProduct(String),

    #[error("beam {beam} in {path}: variable {variable} has {len} values, expected {expected}")]
    BeamLengthMismatch {
        path: PathBuf,
        beam: &'static str,
        variable: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("no granule files in {0}")]
    NoGranules(PathBuf),

    #[error("expected exactly one .shp in archive {path}, found {found}")]
    ShapefileCount { path: PathBuf, found: usize },

    #[error("no feature with a geometry in {0}")]
    EmptyShapefile(PathBuf),

    #[error("table has no rows")]
    EmptyTable,

    #[error("no row has both longitude and latitude")]
    NoLocatedPoint,
}
