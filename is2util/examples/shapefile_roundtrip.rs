use anyhow::Result;
use geo::polygon;
use is2util::geometric::polygon::{format_polygon, simplify_for_url, SimplifyOptions};
use is2util::geometric::shapefile::{
    first_geometry_from_zipped_shapefile, geometry_to_zipped_shapefile, ShapefileOptions,
};
use std::path::Path;

/// Example: write a polygon to a zipped shapefile, read it back and format it
fn main() -> Result<()> {
    env_logger::init();

    println!("=== Example: zipped shapefile round trip ===\n");

    let area = polygon![
        (x: -1.152704, y: 46.181627),
        (x: -1.139893, y: 46.181627),
        (x: -1.139893, y: 46.18699),
        (x: -1.152704, y: 46.18699),
        (x: -1.152704, y: 46.181627),
    ];

    std::fs::create_dir_all("./output")?;
    let zip_path = geometry_to_zipped_shapefile(
        &area,
        Path::new("./output/area.zip"),
        &ShapefileOptions::default(),
    )?;
    println!("Zipped shapefile written: {:?}", zip_path);

    let read_back = first_geometry_from_zipped_shapefile(&zip_path)?;
    let simplified = simplify_for_url(&read_back, &SimplifyOptions::default())?;
    println!("Polygon parameter: {}", format_polygon(&simplified)?);

    Ok(())
}
