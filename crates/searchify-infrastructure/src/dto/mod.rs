//! Data Transfer Objects (DTOs) for the REST API.
//!
//! These DTOs mirror the service's JSON schema and are converted into
//! domain types at the boundary, so wire-format quirks (integer ids, naive
//! timestamps, optional status) never leak into the engine.

mod conversation;

pub use conversation::{
    AppendMessageRequest, ChatDto, ChatWithMessagesDto, CreateChatRequest, ErrorBody, MessageDto,
    parse_timestamp,
};
