pub mod accounts;
pub mod gateway;
pub mod memory;
pub mod notification;
pub mod payment;
pub mod stripe;
pub mod webhook;
