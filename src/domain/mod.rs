//! Entities, value objects and invariants of the social graph.

pub mod chat;
pub mod community;
pub mod error;
pub mod id;
pub mod message;
pub mod notification;
pub mod post;
pub mod role;
pub mod user;

pub use chat::*;
pub use community::*;
pub use id::*;
pub use message::*;
pub use notification::*;
pub use post::*;
pub use role::*;
pub use user::*;
