use anyhow::{Context, Result};
use searchify_core::config::SearchifyConfig;
use searchify_core::conversation::{Message, MessageRole, PlaceholderPolicy};
use searchify_infrastructure::ConfigService;
use std::path::PathBuf;

/// Flags shared by every subcommand.
pub struct GlobalOptions {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub config: Option<PathBuf>,
}

/// Loads the configuration and applies command-line overrides.
///
/// Priority: flags > environment > config file > defaults.
pub fn load_config(options: &GlobalOptions) -> Result<SearchifyConfig> {
    let service = match &options.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    };
    let mut config = service
        .get_config()
        .context("Failed to load searchify configuration")?;

    if let Some(url) = &options.api_url {
        config.service.base_url = url.clone();
    }
    if let Some(token) = &options.token {
        config.service.api_token = Some(token.clone());
    }
    tracing::debug!("Using research service at {}", config.service.base_url);
    Ok(config)
}

pub fn print_message(message: &Message, policy: &PlaceholderPolicy) {
    let label = match message.role {
        MessageRole::User => "🧑 You",
        MessageRole::Assistant => "🔎 Searchify",
    };
    if policy.is_placeholder(message) {
        println!("{} (pending): {}", label, message.content);
    } else {
        println!("{}: {}", label, message.content);
    }
}
