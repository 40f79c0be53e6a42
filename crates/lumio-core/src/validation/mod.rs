//! Validation modules

pub mod file;

pub use file::{content_type_for, PhotoValidator};
