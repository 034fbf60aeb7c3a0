use anyhow::{Result, anyhow, bail};
use searchify_core::error::SearchifyError;
use searchify_infrastructure::HttpConversationService;

pub async fn check(service: &HttpConversationService) -> Result<()> {
    let base_url = service.base_url();
    let healthy = service
        .health()
        .await
        .map_err(|e| anyhow!(failure_message(base_url, &e)))?;

    if !healthy {
        bail!("Research service at {} reported an unhealthy status", base_url);
    }
    println!("✅ Research service at {} is healthy", base_url);
    Ok(())
}

fn failure_message(base_url: &str, error: &SearchifyError) -> String {
    if error.is_transient() {
        format!(
            "Research service at {} is unreachable, try again later: {}",
            base_url, error
        )
    } else {
        format!("Research service at {} rejected the health check: {}", base_url, error)
    }
}
