use anyhow::{Context, Result};
use geo::{GeodesicLength, LineString, Point};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use polars::prelude::*;

use crate::commons::basic_functions::delta_time_to_micros;
use crate::error::Is2Error;

/// Replace the `delta_time` column by `utc_datetime`
///
/// `delta_time` counts seconds since the ATLAS epoch, 2018-01-01T00:00:00Z.
pub fn delta_time_to_utc(mut df: DataFrame) -> Result<DataFrame> {
    let micros: Vec<Option<i64>> = df
        .column("delta_time")?
        .f64()
        .context("delta_time must be Float64")?
        .into_iter()
        .map(|v| v.and_then(delta_time_to_micros))
        .collect();

    let utc = Series::new("utc_datetime".into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    df.with_column(utc)?;

    Ok(df.drop("delta_time")?)
}

/// Geodesic length (WGS84) of the straight segment between two lon/lat points
pub fn geodesic_line_length(from: Point<f64>, to: Point<f64>) -> f64 {
    LineString::from(vec![from, to]).geodesic_length()
}

/// Distance in meters from every point to `ref_point` (default: first located row)
///
/// Point-to-point distances, meaningful along a single homogeneous beam.
pub fn along_track_distance(df: &DataFrame, ref_point: Option<Point<f64>>) -> Result<Series> {
    let lon = df.column("longitude")?.f64()?;
    let lat = df.column("latitude")?.f64()?;

    let reference = match ref_point {
        Some(point) => point,
        None if df.height() == 0 => return Err(Is2Error::EmptyTable.into()),
        None => lon
            .into_iter()
            .zip(lat)
            .find_map(|(x, y)| Some(Point::new(x?, y?)))
            .ok_or(Is2Error::NoLocatedPoint)?,
    };

    let distances: Vec<Option<f64>> = lon
        .into_iter()
        .zip(lat)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(geodesic_line_length(reference, Point::new(x, y))),
            _ => None,
        })
        .collect();

    Ok(Series::new("distance".into(), distances))
}

/// One GeoJSON Point feature per row, every other column as a property
pub fn to_point_features(df: &DataFrame) -> Result<FeatureCollection> {
    let lon = df.column("longitude")?.f64()?;
    let lat = df.column("latitude")?.f64()?;
    let properties: Vec<&Column> = df
        .get_columns()
        .iter()
        .filter(|c| c.name() != "longitude" && c.name() != "latitude")
        .collect();

    let mut features = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let geometry = match (lon.get(row), lat.get(row)) {
            (Some(x), Some(y)) => Some(Geometry::new(Value::Point(vec![x, y]))),
            _ => None,
        };
        let mut feature = Feature {
            geometry,
            ..Default::default()
        };
        for column in &properties {
            let value = match column.get(row)? {
                AnyValue::Null => serde_json::Value::Null,
                AnyValue::Float64(v) => serde_json::Value::from(v),
                AnyValue::String(s) => serde_json::Value::from(s),
                other => serde_json::Value::from(other.to_string()),
            };
            feature.set_property(column.name().as_str(), value);
        }
        features.push(feature);
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
