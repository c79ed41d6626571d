use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::conversation::{Conversation, Turn};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode conversation export: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write export to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationExport<'a> {
    pub title: &'a str,
    pub messages: &'a [Turn],
    pub exported_at: DateTime<Utc>,
}

impl<'a> ConversationExport<'a> {
    pub fn new(conversation: &'a Conversation, exported_at: DateTime<Utc>) -> Self {
        Self {
            title: &conversation.title,
            messages: &conversation.turns,
            exported_at,
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `chat-<title>.json`, with every character outside `[A-Za-z0-9]` replaced
/// by `_` and the result lowercased.
pub fn export_file_name(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("chat-{slug}.json")
}

pub fn write_export(
    conversation: &Conversation,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let body = ConversationExport::new(conversation, now).to_pretty_json()?;
    let path = dir.join(export_file_name(&conversation.title));

    fs::write(&path, body).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), turns = conversation.turns.len(), "conversation exported");
    Ok(path)
}
