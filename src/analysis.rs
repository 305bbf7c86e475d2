//! Optional AI analysis via rig-core.
//!
//! A best-effort text-generation call that suggests next actions for a work
//! item. It is bounded by a timeout and degrades to an explanatory message
//! on any failure; it can never stall or corrupt workflow state, and the
//! engine never depends on its output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};
use crate::model::WorkItem;

/// Default completion model for analysis calls.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Upper bound on a single analysis call.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(15);

/// Create an Anthropic client from a secret API key.
///
/// # Errors
/// Returns [`Error::Upstream`] if the underlying HTTP client cannot be
/// constructed.
pub fn anthropic_client(api_key: &SecretString) -> Result<rig::providers::anthropic::Client> {
    rig::providers::anthropic::Client::new(api_key.expose_secret())
        .map_err(|e| Error::Upstream(e.to_string()))
}

/// Ask the model for a short operational read on a work item.
///
/// Always returns text: either the model's suggestion or a fallback
/// explaining why analysis was unavailable.
pub async fn analyze(client: &rig::providers::anthropic::Client, item: &WorkItem) -> String {
    use rig::client::CompletionClient;
    use rig::completion::Prompt;

    let agent = client
        .agent(DEFAULT_MODEL)
        .preamble(
            "You are a construction-operations assistant. Given a work item, \
             reply with a short, practical assessment: likely cause, immediate \
             next steps, and who should be involved. Three sentences maximum.",
        )
        .build();

    let prompt = describe(item);

    match tokio::time::timeout(ANALYSIS_TIMEOUT, async { agent.prompt(prompt).await }).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(item = %item.id, error = %e, "analysis call failed");
            fallback()
        }
        Err(_) => {
            tracing::warn!(item = %item.id, "analysis call timed out");
            fallback()
        }
    }
}

fn describe(item: &WorkItem) -> String {
    let mut lines = vec![
        format!("Kind: {}", item.kind),
        format!("Priority: {}", item.priority),
        format!("Status: {}", item.status),
        format!("Title: {}", item.title),
    ];
    if !item.description.is_empty() {
        lines.push(format!("Description: {}", item.description));
    }
    if !item.tags.is_empty() {
        lines.push(format!("Tags: {}", item.tags.join(", ")));
    }
    lines.join("\n")
}

fn fallback() -> String {
    "Analysis is unavailable right now; the work item is unaffected. \
     Review the description and assign it manually."
        .to_string()
}
