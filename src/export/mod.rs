pub mod csv;
pub mod file;
