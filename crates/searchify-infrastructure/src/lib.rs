//! Infrastructure layer for the Searchify client.
//!
//! Provides the HTTP implementation of the conversation service, wire DTOs
//! and configuration file loading.

pub mod config_service;
pub mod dto;
pub mod http_conversation_service;
pub mod paths;

pub use crate::config_service::ConfigService;
pub use crate::http_conversation_service::HttpConversationService;
pub use crate::paths::SearchifyPaths;
