use anyhow::{Context, Result};
use hdf5::types::{FixedAscii, VarLenAscii, VarLenUnicode};
use hdf5::File;
use log::{debug, info};
use polars::functions::concat_df_diagonal;
use polars::prelude::*;
use std::path::Path;

use crate::error::Is2Error;
use crate::granule::product::{Product, BEAMS};

/// Root attribute naming the data product of a granule
pub const PRODUCT_TYPE_ATTR: &str = "identifier_product_type";

/// Granule files picked up by [`load_icesat2_directory`]
pub const GRANULE_GLOB: &str = "**/*ATL*h5";

/// A variable absent from one beam of a granule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVariable {
    pub beam: &'static str,
    pub variable: &'static str,
}

/// Table of one granule plus the variables it lacked
#[derive(Debug, Clone)]
pub struct GranuleLoad {
    pub product: Product,
    /// One row per measurement point: product fields, `beam`, `filename`
    pub frame: DataFrame,
    pub missing: Vec<MissingVariable>,
}

/// Load the points of an ICESat-2 granule as a DataFrame
pub fn load_icesat2<P: AsRef<Path>>(filepath: P) -> Result<DataFrame> {
    Ok(load_granule(filepath)?.frame)
}

/// Load a granule, keeping track of the variables missing from each beam
///
/// Every variable of every beam is attempted on its own. A beam with no
/// variable contributes no rows; a beam missing only some variables
/// contributes rows with nulls in those columns.
pub fn load_granule<P: AsRef<Path>>(filepath: P) -> Result<GranuleLoad> {
    let filepath = filepath.as_ref();
    let file = File::open(filepath).context(format!("Failed to open granule: {:?}", filepath))?;
    let product = read_product_type(&file, filepath)?;
    let fields = product.fields();
    let filename = filepath
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); fields.len()];
    let mut beams: Vec<&str> = Vec::new();
    let mut missing = Vec::new();

    for beam in BEAMS {
        let group = if file.link_exists(beam) {
            Some(file.group(beam).context(format!("Failed to open beam group {}", beam))?)
        } else {
            None
        };

        let mut values: Vec<Option<Vec<f64>>> = Vec::with_capacity(fields.len());
        for field in fields {
            let data = match &group {
                Some(g) if g.link_exists(field.path) => Some(
                    g.dataset(field.path)
                        .and_then(|ds| ds.read_raw::<f64>())
                        .context(format!(
                            "Failed to read {}/{} from {:?}",
                            beam, field.path, filepath
                        ))?,
                ),
                _ => None,
            };
            if data.is_none() {
                info!(
                    "Variable {} not found in {} of {:?}. Likely an empty granule",
                    field.name, beam, filepath
                );
                missing.push(MissingVariable {
                    beam,
                    variable: field.name,
                });
            }
            values.push(data);
        }

        let Some(expected) = values.iter().flatten().map(Vec::len).next() else {
            continue;
        };
        for (field, data) in fields.iter().zip(&values) {
            if let Some(data) = data {
                if data.len() != expected {
                    return Err(Is2Error::BeamLengthMismatch {
                        path: filepath.to_path_buf(),
                        beam,
                        variable: field.name,
                        len: data.len(),
                        expected,
                    }
                    .into());
                }
            }
        }

        for (column, data) in columns.iter_mut().zip(values) {
            match data {
                Some(data) => column.extend(data.into_iter().map(Some)),
                None => column.extend(std::iter::repeat(None).take(expected)),
            }
        }
        beams.extend(std::iter::repeat(beam).take(expected));
        debug!("Read {} rows from {} of {:?}", expected, beam, filepath);
    }

    let height = beams.len();
    let mut frame_columns: Vec<Column> = fields
        .iter()
        .zip(columns)
        .map(|(field, values)| Series::new(field.name.into(), values).into())
        .collect();
    frame_columns.push(Series::new("beam".into(), beams).into());
    frame_columns.push(Series::new("filename".into(), vec![filename.as_str(); height]).into());

    let frame = DataFrame::new(frame_columns).context("Failed to create DataFrame")?;

    Ok(GranuleLoad {
        product,
        frame,
        missing,
    })
}

/// Load every granule matching `**/*ATL*h5` below `directory` into one DataFrame
///
/// Granules of different products are stacked on the union of their columns.
pub fn load_icesat2_directory<P: AsRef<Path>>(directory: P) -> Result<DataFrame> {
    let directory = directory.as_ref();
    // the directory itself may contain glob metacharacters
    let escaped = glob::Pattern::escape(&directory.to_string_lossy());
    let pattern = Path::new(&escaped).join(GRANULE_GLOB);
    let mut filepaths = glob::glob(&pattern.to_string_lossy())
        .context("Invalid granule glob pattern")?
        .collect::<Result<Vec<_>, _>>()
        .context(format!("Failed to list granules in {:?}", directory))?;
    filepaths.sort();

    if filepaths.is_empty() {
        return Err(Is2Error::NoGranules(directory.to_path_buf()).into());
    }

    info!("Loading {} granules from {:?}", filepaths.len(), directory);
    let frames = filepaths
        .iter()
        .map(load_icesat2)
        .collect::<Result<Vec<_>>>()?;

    concat_df_diagonal(&frames).context("Failed to concatenate granules")
}

/// Product of a granule from its `identifier_product_type` attribute
pub fn read_product_type(file: &File, filepath: &Path) -> Result<Product> {
    let has_attr = file
        .attr_names()
        .context("Failed to list granule attributes")?
        .iter()
        .any(|name| name == PRODUCT_TYPE_ATTR);
    if !has_attr {
        return Err(Is2Error::MissingAttribute {
            attribute: PRODUCT_TYPE_ATTR,
            path: filepath.to_path_buf(),
        }
        .into());
    }

    let attr = file.attr(PRODUCT_TYPE_ATTR)?;
    // ATLAS products store fixed-length ASCII, files written by other tools may use variable length
    let value = attr
        .read_raw::<FixedAscii<64>>()
        .map(|v| v.first().map(|s| s.as_str().to_string()))
        .or_else(|_| {
            attr.read_raw::<VarLenAscii>()
                .map(|v| v.first().map(|s| s.as_str().to_string()))
        })
        .or_else(|_| {
            attr.read_raw::<VarLenUnicode>()
                .map(|v| v.first().map(|s| s.as_str().to_string()))
        })
        .context(format!("Failed to read {} as a string", PRODUCT_TYPE_ATTR))?
        .ok_or_else(|| Is2Error::MissingAttribute {
            attribute: PRODUCT_TYPE_ATTR,
            path: filepath.to_path_buf(),
        })?;

    Ok(value.parse::<Product>()?)
}
