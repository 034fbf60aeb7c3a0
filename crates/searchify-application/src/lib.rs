//! Application layer for Searchify.
//!
//! This crate provides the session synchronization engine that coordinates
//! between the domain types and the conversation service.

pub mod session;

pub use session::{PollOutcome, SessionSnapshot, SessionSync};
