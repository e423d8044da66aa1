pub mod egi;
pub mod global_variables;
