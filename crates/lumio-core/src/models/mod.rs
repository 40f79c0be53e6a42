//! Data models for the upload orchestrator
//!
//! Photos and order queues are shared as `Arc`s so that a store mutation can
//! replace exactly the entities it touches while every other snapshot keeps
//! pointer identity.

mod notification;
mod order;
mod photo;
mod stats;

pub use notification::*;
pub use order::*;
pub use photo::*;
pub use stats::*;
