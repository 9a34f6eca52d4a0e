//! Optional notification sent once a generated draft is saved, so someone
//! knows there is a draft waiting for review.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generator::SectionContent;

const SNIPPET_CHARS: usize = 500;
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Blog Review]";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("review notification failed: {0}")]
    Request(String),

    #[error("review endpoint answered {0}")]
    Status(u16),

    #[error("review notification timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNotice {
    pub subject: String,
    pub title: String,
    pub slug: String,
    pub path: PathBuf,
    /// Start of the generated sections, for a quick look.
    pub snippet: String,
    /// The whole draft file.
    pub markdown: String,
}

impl ReviewNotice {
    pub fn new(subject_prefix: &str, title: &str, slug: &str, path: PathBuf, sections: &[SectionContent], markdown: String) -> Self {
        ReviewNotice {
            subject: format!("{} {}", subject_prefix, title).trim().to_string(),
            title: title.to_string(),
            slug: slug.to_string(),
            path,
            snippet: snippet(sections),
            markdown,
        }
    }
}

fn snippet(sections: &[SectionContent]) -> String {
    let text = sections.iter()
        .map(|s| format!("## {}\n{}", s.title, s.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    async fn notify(&self, notice: &ReviewNotice) -> Result<(), NotifyError>;
}

/// `[generator.review]` in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub subject_prefix: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            enabled: false,
            webhook_url: None,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
        }
    }
}

/// Posts the notice as JSON to a webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        WebhookNotifier {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ReviewNotifier for WebhookNotifier {
    async fn notify(&self, notice: &ReviewNotice) -> Result<(), NotifyError> {
        let response = self.client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
