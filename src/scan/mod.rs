pub mod bluetooth;
pub mod capability;
pub mod controller;

#[cfg(test)]
pub(crate) mod fake;
