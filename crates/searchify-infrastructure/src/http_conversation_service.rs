//! HttpConversationService - REST implementation of the conversation service.
//!
//! Talks to the research backend's chat API:
//!
//! - `POST   /chats/`               create
//! - `GET    /chats/`               list
//! - `GET    /chats/{id}`           fetch with messages
//! - `PUT    /chats/{id}`           rename / archive
//! - `DELETE /chats/{id}`           delete (soft unless `permanent`)
//! - `POST   /chats/{id}/messages`  append, returns the persisted batch
//!
//! All paths are relative to `base_url + api_prefix`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use searchify_core::config::ServiceConfig;
use searchify_core::conversation::{
    Conversation, ConversationId, ConversationService, ConversationUpdate, Message, MessageRole,
};
use searchify_core::error::{Result, SearchifyError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::dto::{
    AppendMessageRequest, ChatDto, ChatWithMessagesDto, CreateChatRequest, ErrorBody, MessageDto,
};

/// Page size used when listing conversations.
const LIST_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Conversation service backed by the REST API.
#[derive(Clone)]
pub struct HttpConversationService {
    client: Client,
    base_url: String,
    api_url: String,
    api_token: Option<String>,
    timeout: Duration,
}

impl HttpConversationService {
    /// Creates a client for the given service configuration.
    pub fn new(config: &ServiceConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let prefix = config.api_prefix.trim_end_matches('/');
        Self {
            client: Client::new(),
            api_url: format!("{}{}", base_url, prefix),
            base_url,
            api_token: config.api_token.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// Sets the bearer token sent with every request.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Root of the service, where `/health` lives.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the backend is reachable.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the service reports `{"status": "ok"}`.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.send(self.client.get(&url), "health check").await?;
        let body: HealthResponse = read_json(response, "health check").await?;
        Ok(body.status == "ok")
    }

    fn chats_url(&self) -> String {
        format!("{}/chats/", self.api_url)
    }

    fn chat_url(&self, id: ConversationId) -> String {
        format!("{}/chats/{}", self.api_url, id)
    }

    /// Applies auth and timeout, sends, and maps non-success statuses.
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let mut request = request.timeout(self.timeout);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            SearchifyError::network(format!("Failed to {}: {}", action, e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorBody>(&error_text)
            .map(|body| body.message())
            .unwrap_or(error_text);

        tracing::warn!(
            "[HttpConversationService] {} failed with {}: {}",
            action,
            status,
            message
        );

        Err(status_error(status, action, message))
    }
}

fn status_error(status: StatusCode, action: &str, message: String) -> SearchifyError {
    match status {
        StatusCode::NOT_FOUND => SearchifyError::not_found("Conversation", message),
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
            SearchifyError::validation(format!("{} rejected: {}", action, message))
        }
        _ => SearchifyError::http(status.as_u16(), message),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
    let bytes = response.bytes().await.map_err(|e| {
        SearchifyError::network(format!("Failed to read {} response: {}", action, e))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ConversationService for HttpConversationService {
    async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let request = self
            .client
            .post(self.chats_url())
            .json(&CreateChatRequest { title });
        let response = self.send(request, "create conversation").await?;
        let dto: ChatDto = read_json(response, "create conversation").await?;
        tracing::info!("[HttpConversationService] Created conversation {}", dto.id);
        Conversation::try_from(dto)
    }

    async fn list_conversations(&self, active_only: bool) -> Result<Vec<Conversation>> {
        let request = self.client.get(self.chats_url()).query(&[
            ("active_only", active_only.to_string()),
            ("skip", "0".to_string()),
            ("limit", LIST_LIMIT.to_string()),
        ]);
        let response = self.send(request, "list conversations").await?;
        let dtos: Vec<ChatDto> = read_json(response, "list conversations").await?;
        dtos.into_iter().map(Conversation::try_from).collect()
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        let response = self
            .send(self.client.get(self.chat_url(id)), "fetch conversation")
            .await
            .map_err(|e| match e {
                SearchifyError::NotFound { .. } => {
                    SearchifyError::not_found("Conversation", id.to_string())
                }
                other => other,
            })?;
        let dto: ChatWithMessagesDto = read_json(response, "fetch conversation").await?;
        Conversation::try_from(dto)
    }

    async fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<Vec<Message>> {
        let request = self
            .client
            .post(format!("{}/messages", self.chat_url(id)))
            .json(&AppendMessageRequest { role, content });
        let response = self.send(request, "append message").await?;
        let dtos: Vec<MessageDto> = read_json(response, "append message").await?;
        dtos.into_iter().map(Message::try_from).collect()
    }

    async fn delete_conversation(&self, id: ConversationId, permanent: bool) -> Result<()> {
        let request = self
            .client
            .delete(self.chat_url(id))
            .query(&[("permanent", permanent.to_string())]);
        self.send(request, "delete conversation").await?;
        tracing::info!(
            "[HttpConversationService] Deleted conversation {} (permanent={})",
            id,
            permanent
        );
        Ok(())
    }

    async fn update_conversation(
        &self,
        id: ConversationId,
        update: &ConversationUpdate,
    ) -> Result<Conversation> {
        let request = self.client.put(self.chat_url(id)).json(update);
        let response = self.send(request, "update conversation").await?;
        let dto: ChatDto = read_json(response, "update conversation").await?;
        Conversation::try_from(dto)
    }
}
