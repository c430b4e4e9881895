//! Outbound adapters for the store and event ports.

pub mod memory;
pub mod postgres;
pub mod rabbitmq;
