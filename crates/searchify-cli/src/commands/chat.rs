use super::utils::print_message;
use anyhow::{Context, Result};
use searchify_application::{PollOutcome, SessionSync};
use searchify_core::conversation::ConversationId;

pub async fn ask(
    sync: &SessionSync,
    query: &str,
    conversation: Option<ConversationId>,
    wait: bool,
) -> Result<()> {
    if let Some(id) = conversation {
        sync.load_conversation(id)
            .await
            .with_context(|| format!("Failed to load conversation {}", id))?;
    }

    sync.submit_query(query)
        .await
        .context("Failed to submit query")?;

    let snapshot = sync.snapshot();
    let id = snapshot
        .conversation_id
        .context("No conversation is active after submitting")?;
    println!("💬 Conversation {}", id);

    let Some(response_id) = snapshot.current_response_id else {
        println!("No reply was generated.");
        return Ok(());
    };

    if wait {
        if let Some(outcome) = sync.wait_for_resolution(id, response_id).await {
            match outcome {
                PollOutcome::Resolved { attempts, .. } => {
                    tracing::debug!("Answer ready after {} poll(s)", attempts);
                }
                PollOutcome::TimedOut { attempts } => {
                    println!(
                        "⚠️  No answer after {} poll(s). Run `searchify show {}` later.",
                        attempts, id
                    );
                }
                PollOutcome::Cancelled { .. } => {}
            }
        }
    }

    let snapshot = sync.snapshot();
    if let Some(reply) = snapshot.messages.iter().find(|m| m.id == response_id) {
        print_message(reply, sync.placeholder_policy());
    }
    Ok(())
}

pub async fn show(sync: &SessionSync, id: ConversationId) -> Result<()> {
    let messages = sync
        .load_conversation(id)
        .await
        .with_context(|| format!("Failed to load conversation {}", id))?;

    if messages.is_empty() {
        println!("Conversation {} has no messages yet.", id);
        return Ok(());
    }
    for message in messages.iter() {
        print_message(message, sync.placeholder_policy());
    }
    Ok(())
}
