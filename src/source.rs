use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::message::Message;

/// Upper bound on messages taken from a single fetch.
pub const MAX_MESSAGES: usize = 1000;

/// One Graph response page (`GET /me/messages`).
#[derive(Debug, Deserialize)]
struct MessagePage {
    value: Vec<Message>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageQuery {
    /// Drop messages received before this instant.
    pub since: Option<DateTime<Utc>>,
    pub max_messages: usize,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            since: None,
            max_messages: MAX_MESSAGES,
        }
    }
}

impl MessageQuery {
    pub fn days_back(days: u32) -> Self {
        Self {
            since: Some(Utc::now() - Duration::days(i64::from(days))),
            ..Self::default()
        }
    }

    fn accepts(&self, message: &Message) -> bool {
        match (self.since, message.received_date_time) {
            (Some(since), Some(received)) => received >= since,
            _ => true,
        }
    }

    fn limit(&self) -> usize {
        self.max_messages.min(MAX_MESSAGES)
    }
}

/// Reads message pages in order until the query's limit is reached.
pub fn load_messages(paths: &[PathBuf], query: &MessageQuery) -> Result<Vec<Message>> {
    let start_time = Instant::now();
    let limit = query.limit();
    let mut messages = Vec::new();

    for path in paths {
        if messages.len() >= limit {
            warn!(
                action = "truncate",
                component = "message_source",
                limit,
                file_path = ?path,
                "Message limit reached, ignoring remaining pages"
            );
            break;
        }

        let page = read_page(path)?;
        let before = messages.len();
        messages.extend(page.into_iter().filter(|m| query.accepts(m)));
        messages.truncate(limit);

        info!(
            action = "load",
            component = "message_source",
            file_path = ?path,
            message_count = messages.len() - before,
            "Loaded message page"
        );
    }

    info!(
        action = "complete",
        component = "message_source",
        message_count = messages.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Message loading completed"
    );
    Ok(messages)
}

fn read_page(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        anyhow::bail!("Message file not found: {:?}", path);
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    parse_messages(&content).with_context(|| format!("Failed to parse messages in {:?}", path))
}

/// Parses a bare array of messages, one Graph page, or a single message
/// object (`GET /me/messages/{id}`).
pub fn parse_messages(content: &str) -> Result<Vec<Message>> {
    let shape: Value = serde_json::from_str(content)?;

    // Deserialize from the text again so errors keep their line and column.
    match shape {
        Value::Array(_) => Ok(serde_json::from_str(content)?),
        Value::Object(ref fields) if fields.contains_key("value") => {
            let page: MessagePage = serde_json::from_str(content)?;
            if page.next_link.is_some() {
                info!(
                    action = "parse",
                    component = "message_source",
                    "Page has a next link, supply following pages as extra inputs"
                );
            }
            Ok(page.value)
        }
        Value::Object(_) => {
            let message: Message = serde_json::from_str(content)?;
            Ok(vec![message])
        }
        _ => anyhow::bail!("Expected a message, a list of messages or a message page"),
    }
}
