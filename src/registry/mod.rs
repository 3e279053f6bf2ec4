pub mod registry;
pub mod wrapper;
