//! Domain layer for the Searchify client.
//!
//! Pure types and traits shared by the infrastructure and application
//! crates: conversations, messages, placeholder detection, configuration
//! and the shared error type.

pub mod config;
pub mod conversation;
pub mod error;

// Re-export common error type
pub use error::{Result, SearchifyError};
