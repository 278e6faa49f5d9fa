pub mod booking;
pub mod lifecycle;
pub mod memory;
pub mod routing;
pub mod store;
