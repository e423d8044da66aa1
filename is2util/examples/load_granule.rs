use anyhow::{bail, Result};
use is2util::granule::loader::{load_granule, load_icesat2_directory};
use is2util::granule::track::{along_track_distance, delta_time_to_utc};
use std::path::Path;

/// Example: load a granule (or a directory of granules) and derive track columns
///
/// Usage: cargo run --example load_granule -- <file.h5 | directory>
fn main() -> Result<()> {
    env_logger::init();

    let Some(input) = std::env::args().nth(1) else {
        bail!("usage: load_granule <file.h5 | directory>");
    };
    let input = Path::new(&input);

    println!("=== Example: loading ICESat-2 granules ===\n");

    let df = if input.is_dir() {
        load_icesat2_directory(input)?
    } else {
        let load = load_granule(input)?;
        println!("Product: {}", load.product);
        for missing in &load.missing {
            println!("  - missing {}/{}", missing.beam, missing.variable);
        }
        load.frame
    };

    println!("Loaded {} points, columns: {:?}", df.height(), df.get_column_names());

    let mut df = delta_time_to_utc(df)?;
    if df.height() > 0 {
        let distance = along_track_distance(&df, None)?;
        df.with_column(distance)?;
    }

    println!("\n{}", df.head(Some(10)));

    Ok(())
}
