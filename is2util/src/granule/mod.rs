pub mod loader;
pub mod product;
pub mod track;
