//! These traits define what the core needs from the outside world.

pub mod publisher;
pub mod store;

pub use publisher::*;
pub use store::*;
