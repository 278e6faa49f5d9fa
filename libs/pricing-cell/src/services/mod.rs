pub mod memory;
pub mod pricing;
pub mod store;
