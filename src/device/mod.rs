pub mod constants;
pub mod registry;
pub mod types;
