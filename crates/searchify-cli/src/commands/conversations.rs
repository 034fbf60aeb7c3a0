use anyhow::{Context, Result};
use searchify_application::SessionSync;
use searchify_core::conversation::ConversationId;

pub async fn list(sync: &SessionSync, active_only: bool) -> Result<()> {
    let conversations = sync
        .list_conversations(active_only)
        .await
        .context("Failed to list conversations")?;

    if conversations.is_empty() {
        println!("No conversations yet. Start one with `searchify ask <question>`.");
        return Ok(());
    }

    println!("📋 {} conversation(s):", conversations.len());
    for conversation in &conversations {
        let updated = conversation.updated_at.unwrap_or(conversation.created_at);
        let archived = if conversation.is_active { "" } else { " (archived)" };
        println!(
            "  {:>5}  {}  {}{}",
            conversation.id,
            updated.format("%Y-%m-%d %H:%M"),
            conversation.display_title(),
            archived
        );
    }
    Ok(())
}

pub async fn rename(sync: &SessionSync, id: ConversationId, title: &str) -> Result<()> {
    let conversation = sync
        .rename_conversation(id, title)
        .await
        .with_context(|| format!("Failed to rename conversation {}", id))?;
    println!("✅ Conversation {} renamed to \"{}\"", id, conversation.display_title());
    Ok(())
}

pub async fn delete(sync: &SessionSync, id: ConversationId, permanent: bool) -> Result<()> {
    sync.delete_conversation(id, permanent)
        .await
        .with_context(|| format!("Failed to delete conversation {}", id))?;
    if permanent {
        println!("🗑️  Conversation {} deleted permanently", id);
    } else {
        println!("📦 Conversation {} archived", id);
    }
    Ok(())
}
