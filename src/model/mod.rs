pub mod config;
pub mod matrix;
pub mod profile;
pub mod reference;
pub mod result;
pub mod taxonomy;
