use anyhow::{Context, Result};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::{
    FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
};
use gdal::{Dataset, DriverManager};
use geo::{Geometry as GeoGeometry, Polygon};
use log::{debug, info};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::collect::global_variables::GEOG_EPSG;
use crate::error::Is2Error;
use crate::geometric::polygon::polygon_from_geometry;

/// OGR vector driver used to persist a geometry
///
/// Passed explicitly per call: nothing in the GDAL driver registry is toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorDriver {
    #[default]
    EsriShapefile,
    Libkml,
}

impl VectorDriver {
    pub fn gdal_name(&self) -> &'static str {
        match self {
            VectorDriver::EsriShapefile => "ESRI Shapefile",
            VectorDriver::Libkml => "LIBKML",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VectorDriver::EsriShapefile => "shp",
            VectorDriver::Libkml => "kml",
        }
    }
}

/// Output settings for [`geometry_to_shapefile`]
#[derive(Debug, Clone, PartialEq)]
pub struct ShapefileOptions {
    pub driver: VectorDriver,
    /// EPSG code of the written layer
    pub epsg: u32,
    /// Value of the single `id` property
    pub feature_id: i32,
}

impl Default for ShapefileOptions {
    fn default() -> Self {
        ShapefileOptions {
            driver: VectorDriver::EsriShapefile,
            epsg: GEOG_EPSG,
            feature_id: 123,
        }
    }
}

/// Write a polygon as the single feature of a new layer
/// Schema: `{geometry: Polygon, properties: {id: int}}`
/// The extension of `filepath` is replaced by the driver's own. Returns the written path.
pub fn geometry_to_shapefile(
    geometry: &Polygon<f64>,
    filepath: &Path,
    options: &ShapefileOptions,
) -> Result<PathBuf> {
    let out_path = filepath.with_extension(options.driver.extension());
    let layer_name = out_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("subset")
        .to_string();

    let driver = DriverManager::get_driver_by_name(options.driver.gdal_name())
        .context(format!("{} driver not available", options.driver.gdal_name()))?;
    let mut dataset = driver
        .create_vector_only(&out_path)
        .context(format!("Failed to create vector dataset: {:?}", out_path))?;

    let srs = SpatialRef::from_epsg(options.epsg)
        .context(format!("Failed to create SRS for EPSG:{}", options.epsg))?;

    let mut layer = dataset
        .create_layer(LayerOptions {
            name: &layer_name,
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbPolygon,
            ..Default::default()
        })
        .context("Failed to create layer")?;

    layer
        .create_defn_fields(&[("id", OGRFieldType::OFTInteger)])
        .context("Failed to create id field")?;

    let gdal_geometry = geometry
        .to_gdal()
        .context("Failed to convert polygon to GDAL geometry")?;
    layer
        .create_feature_fields(
            gdal_geometry,
            &["id"],
            &[FieldValue::IntegerValue(options.feature_id)],
        )
        .context("Failed to write feature")?;

    debug!("Wrote {} feature to {:?}", options.driver.gdal_name(), out_path);
    Ok(out_path)
}

/// Write a polygon to a shapefile and zip every sidecar file into `zip_filepath`
pub fn geometry_to_zipped_shapefile(
    geometry: &Polygon<f64>,
    zip_filepath: &Path,
    options: &ShapefileOptions,
) -> Result<PathBuf> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    let shp_path = geometry_to_shapefile(geometry, &temp_dir.path().join("tmp"), options)?;

    let pattern = temp_dir.path().join("tmp.*");
    let mut filepaths = glob::glob(&pattern.to_string_lossy())
        .context("Invalid sidecar glob pattern")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list shapefile sidecar files")?;
    filepaths.sort();

    info!(
        "Zipping {} files of {:?} into {:?}",
        filepaths.len(),
        shp_path,
        zip_filepath
    );
    zip_files(zip_filepath, &filepaths)
}

/// Deflate `filepaths` into a flat archive, removing each input once written
pub fn zip_files(zip_filepath: &Path, filepaths: &[PathBuf]) -> Result<PathBuf> {
    let file = File::create(zip_filepath)
        .context(format!("Failed to create archive: {:?}", zip_filepath))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for filepath in filepaths {
        let name = filepath
            .file_name()
            .context(format!("Path has no file name: {:?}", filepath))?
            .to_string_lossy()
            .to_string();
        zip.start_file(name, options)?;
        let mut input =
            File::open(filepath).context(format!("Failed to open {:?}", filepath))?;
        io::copy(&mut input, &mut zip)?;
        fs::remove_file(filepath).context(format!("Failed to remove {:?}", filepath))?;
    }

    zip.finish().context("Failed to finish archive")?;
    Ok(zip_filepath.to_path_buf())
}

/// Extract a zip archive into `dest`
pub fn extract_zip(zip_filepath: &Path, dest: &Path) -> Result<()> {
    let file =
        File::open(zip_filepath).context(format!("Failed to open archive: {:?}", zip_filepath))?;
    let mut archive = ZipArchive::new(file).context("Failed to read ZIP archive")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = match entry.enclosed_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}

/// Read the first polygon of the single shapefile inside a zip archive, in EPSG:4326
pub fn first_geometry_from_zipped_shapefile(zip_filepath: &Path) -> Result<Polygon<f64>> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    extract_zip(zip_filepath, temp_dir.path())?;

    let pattern = temp_dir.path().join("*.shp");
    let shapefile_paths = glob::glob(&pattern.to_string_lossy())
        .context("Invalid shapefile glob pattern")?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list extracted files")?;
    if shapefile_paths.len() != 1 {
        return Err(Is2Error::ShapefileCount {
            path: zip_filepath.to_path_buf(),
            found: shapefile_paths.len(),
        }
        .into());
    }

    first_geometry_from_shapefile(&shapefile_paths[0])
}

/// Read the first geometry of layer 0 of a vector file, reprojected to EPSG:4326
pub fn first_geometry_from_shapefile(filepath: &Path) -> Result<Polygon<f64>> {
    let dataset =
        Dataset::open(filepath).context(format!("Failed to open shapefile: {:?}", filepath))?;
    let mut layer = dataset.layer(0).context("Failed to access first layer")?;

    let transform = match layer.spatial_ref() {
        Some(source_srs) if source_srs.auth_code().ok() != Some(GEOG_EPSG as i32) => {
            let mut source_srs = source_srs;
            source_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
            let mut target_srs =
                SpatialRef::from_epsg(GEOG_EPSG).context("Failed to create target SRS")?;
            target_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
            Some(
                CoordTransform::new(&source_srs, &target_srs)
                    .context("Failed to create coordinate transformation")?,
            )
        }
        _ => None,
    };

    let wkt = layer
        .features()
        .find_map(|feature| {
            let geometry = feature.geometry()?;
            let wkt = match &transform {
                Some(t) => geometry.transform(t).and_then(|g| g.wkt()),
                None => geometry.wkt(),
            };
            Some(wkt)
        })
        .ok_or_else(|| Is2Error::EmptyShapefile(filepath.to_path_buf()))?
        .context("Failed to get WKT from GDAL geometry")?;

    let geos_geom =
        geos::Geometry::new_from_wkt(&wkt).context("Failed to parse WKT with GEOS")?;
    let geometry: GeoGeometry<f64> = geos_geom
        .try_into()
        .context("Failed to convert GEOS geometry to geo")?;

    polygon_from_geometry(geometry)
}
