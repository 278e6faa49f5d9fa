pub mod memory;
pub mod review;
pub mod store;
