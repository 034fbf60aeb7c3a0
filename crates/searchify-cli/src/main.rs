use anyhow::Result;
use clap::{Parser, Subcommand};
use searchify_application::SessionSync;
use searchify_core::conversation::ConversationId;
use searchify_infrastructure::HttpConversationService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::utils::GlobalOptions;

#[derive(Parser)]
#[command(name = "searchify")]
#[command(about = "Searchify CLI - research assistant chat client", long_about = None)]
struct Cli {
    /// Base URL of the research service (overrides config and SEARCHIFY_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true)]
    token: Option<String>,

    /// Path to config.toml (defaults to ~/.config/searchify/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a research question and wait for the answer
    Ask {
        /// The question
        #[arg(required = true)]
        query: Vec<String>,

        /// Continue an existing conversation instead of starting a new one
        #[arg(long, short)]
        conversation: Option<ConversationId>,

        /// Return as soon as the question is stored
        #[arg(long)]
        no_wait: bool,
    },
    /// List conversations
    List {
        /// Include archived conversations
        #[arg(long)]
        all: bool,
    },
    /// Print the messages of a conversation
    Show { id: ConversationId },
    /// Rename a conversation
    Rename { id: ConversationId, title: String },
    /// Delete a conversation
    Delete {
        id: ConversationId,

        /// Remove the conversation and its messages instead of archiving it
        #[arg(long)]
        permanent: bool,
    },
    /// Check that the research service is reachable
    Health,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("searchify=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = commands::utils::load_config(&GlobalOptions {
        api_url: cli.api_url,
        token: cli.token,
        config: cli.config,
    })?;
    let service = Arc::new(HttpConversationService::new(&config.service));
    let sync = SessionSync::new(service.clone(), &config.sync);

    let result = match cli.command {
        Commands::Ask {
            query,
            conversation,
            no_wait,
        } => commands::chat::ask(&sync, &query.join(" "), conversation, !no_wait).await,
        Commands::List { all } => commands::conversations::list(&sync, !all).await,
        Commands::Show { id } => commands::chat::show(&sync, id).await,
        Commands::Rename { id, title } => commands::conversations::rename(&sync, id, &title).await,
        Commands::Delete { id, permanent } => {
            commands::conversations::delete(&sync, id, permanent).await
        }
        Commands::Health => commands::health::check(&service).await,
    };

    sync.shutdown().await;
    result
}
