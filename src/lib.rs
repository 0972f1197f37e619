// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;

// Re-export commonly used types
pub use error::{BotError, ErrorKind};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
