pub mod polygon;
pub mod shapefile;
