//! Lumio Core Library
//!
//! This crate provides the domain models, error types, configuration and file
//! validation shared by every Lumio upload component.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::UploadConfig;
pub use error::{LogLevel, UploadError, UploadResult};
pub use models::{
    Notification, NotificationKind, OrderStatus, OrderUploadQueue, PhotoFile, PhotoStatus,
    UploadPhoto, UploadStats,
};
pub use validation::PhotoValidator;
