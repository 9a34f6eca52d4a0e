//! Turns a topic into a saved draft by driving an external text generation
//! capability through outline, sections and SEO metadata.
//!
//! Every capability answer is validated and replaced by a deterministic
//! fallback when it is missing, malformed or late, so a run only fails when
//! the draft cannot be written.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use spdlog::{debug, error, info, warn};
use thiserror::Error;

use crate::content::frontmatter;
use crate::content::slug::derive_slug;
use crate::content::PostDocument;
use crate::duplicate::{self, ContextEntry, DuplicateVerdict, DEFAULT_OVERLAP_THRESHOLD};
use crate::error::Result;
use crate::generator::review::{NotifyError, ReviewNotice, ReviewNotifier, DEFAULT_SUBJECT_PREFIX};
use crate::store::ContentStore;
use crate::workflow::ContentWorkflow;

pub mod formatter;
pub mod gemini;
pub mod prompts;
pub mod review;

const FALLBACK_SECTIONS: [&str; 3] = ["Introduction", "Main Content", "Conclusion"];
const UNTITLED_SLUG: &str = "untitled-post";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation service answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("generation service returned no text")]
    EmptyResponse,

    #[error("generation output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),
}

/// The external text generator. Answers are never trusted; callers validate them.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    async fn generate_outline(&self, topic: &str, context: &[ContextEntry]) -> std::result::Result<Value, GenerationError>;

    async fn generate_section(
        &self,
        section_title: &str,
        topic: &str,
        outline: &Outline,
        context: &[ContextEntry],
    ) -> std::result::Result<String, GenerationError>;

    async fn generate_seo_meta(&self, full_text: &str, topic: &str) -> std::result::Result<Value, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationStage {
    Idle,
    OutlineRequested,
    OutlineReady,
    SectionsInProgress,
    SectionsComplete,
    SeoRequested,
    SeoReady,
    Formatted,
    Saved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<String>,
}

impl Outline {
    pub fn fallback(topic: &str) -> Self {
        Outline {
            title: topic.to_string(),
            sections: FALLBACK_SECTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Accepts `{"title": "...", "sections": ["...", ...]}` with no blank entries.
    pub fn from_value(value: &Value) -> Option<Self> {
        let title = value.get("title")?.as_str()?.trim();
        if title.is_empty() {
            return None;
        }

        let raw_sections = value.get("sections")?.as_array()?;
        let mut sections = Vec::with_capacity(raw_sections.len());
        for section in raw_sections {
            let section = section.as_str()?.trim();
            if section.is_empty() {
                return None;
            }
            sections.push(section.to_string());
        }
        if sections.is_empty() {
            return None;
        }

        Some(Outline {
            title: title.to_string(),
            sections,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionContent {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoMeta {
    pub seo_title: String,
    pub meta_description: String,
    pub tags: Vec<String>,
}

impl SeoMeta {
    pub fn fallback(topic: &str) -> Self {
        SeoMeta {
            seo_title: topic.to_string(),
            meta_description: format!("An article about {}.", topic),
            tags: topic.to_lowercase().split_whitespace().map(|t| t.to_string()).collect(),
        }
    }

    /// Accepts `{"seoTitle": "...", "metaDescription": "...", "tags": [...]}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let seo_title = value.get("seoTitle")?.as_str()?.trim();
        let meta_description = value.get("metaDescription")?.as_str()?.trim();
        if seo_title.is_empty() || meta_description.is_empty() {
            return None;
        }
        let tags = value.get("tags")?.as_array()?
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Some(SeoMeta {
            seo_title: seo_title.to_string(),
            meta_description: meta_description.to_string(),
            tags,
        })
    }
}

pub fn section_placeholder(section_title: &str) -> String {
    format!("> **Missing section:** content for \"{}\" could not be generated.", section_title)
}

/// State of one generation run. Never persisted.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub topic: String,
    pub context: Vec<ContextEntry>,
    pub stage: GenerationStage,
    pub outline: Option<Outline>,
    pub sections: Vec<SectionContent>,
    pub seo: Option<SeoMeta>,
}

impl GenerationSession {
    pub fn new(topic: &str) -> Self {
        GenerationSession {
            topic: topic.to_string(),
            context: vec![],
            stage: GenerationStage::Idle,
            outline: None,
            sections: vec![],
            seo: None,
        }
    }

    fn advance(&mut self, stage: GenerationStage) {
        debug!("Generation '{}': {:?} -> {:?}", self.topic, self.stage, stage);
        self.stage = stage;
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub timeout: Duration,
    pub overlap_threshold: usize,
    pub author: String,
    pub default_category: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            timeout: Duration::from_secs(60),
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            author: "AI Assistant".to_string(),
            default_category: "General".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The topic overlaps published content; nothing was written.
    Duplicate(DuplicateVerdict),
    Saved { slug: String, title: String, path: PathBuf },
}

pub struct Generator {
    capability: Arc<dyn GenerationCapability>,
    settings: GeneratorSettings,
    notifier: Option<Arc<dyn ReviewNotifier>>,
    subject_prefix: String,
}

impl Generator {
    pub fn new(capability: Arc<dyn GenerationCapability>, settings: GeneratorSettings) -> Self {
        Generator {
            capability,
            settings,
            notifier: None,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
        }
    }

    /// Tells `notifier` about every saved draft.
    pub fn with_notifier(mut self, notifier: Arc<dyn ReviewNotifier>, subject_prefix: &str) -> Self {
        self.notifier = Some(notifier);
        self.subject_prefix = subject_prefix.to_string();
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub async fn generate<S: ContentStore>(&self, topic: &str, workflow: &ContentWorkflow<S>) -> Result<GenerationOutcome> {
        let topic = topic.trim();
        let mut session = GenerationSession::new(topic);

        session.context = match workflow.repository().list_published() {
            Ok(entries) => entries.iter().map(ContextEntry::from).collect(),
            Err(e) => {
                warn!("Could not load published posts, generating without context: {}", e);
                vec![]
            }
        };

        let verdict = duplicate::check(topic, &session.context, self.settings.overlap_threshold);
        if verdict.is_duplicate() {
            info!("Not generating '{}': {}", topic, verdict.reason());
            return Ok(GenerationOutcome::Duplicate(verdict));
        }

        session.advance(GenerationStage::OutlineRequested);
        let outline = self.request_outline(&session).await;
        session.outline = Some(outline.clone());
        session.advance(GenerationStage::OutlineReady);

        session.advance(GenerationStage::SectionsInProgress);
        for section_title in &outline.sections {
            let content = self.request_section(section_title, &outline, &session).await;
            session.sections.push(SectionContent {
                title: section_title.clone(),
                content,
            });
        }
        session.advance(GenerationStage::SectionsComplete);

        session.advance(GenerationStage::SeoRequested);
        let full_text = session.sections.iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let seo = self.request_seo(&full_text, topic).await;
        session.seo = Some(seo.clone());
        session.advance(GenerationStage::SeoReady);

        let slug = Self::draft_slug(&seo.seo_title, topic);
        let today = Utc::now().date_naive();
        let doc = formatter::format_document(&outline.title, &session.sections, &seo, &slug, &self.settings, today);
        session.advance(GenerationStage::Formatted);

        match workflow.save_draft(&slug, &doc) {
            Ok(path) => {
                session.advance(GenerationStage::Saved);
                info!("Generated draft '{}' at {}", slug, path.display());
                let title = doc.title().unwrap_or(topic).to_string();
                self.notify_review(&title, &slug, &path, &session, &doc).await;
                Ok(GenerationOutcome::Saved { slug, title, path })
            }
            Err(e) => {
                session.advance(GenerationStage::Failed);
                error!("Could not save generated draft '{}': {}", slug, e);
                Err(e)
            }
        }
    }

    /// Failures are logged only; the draft is already saved.
    async fn notify_review(&self, title: &str, slug: &str, path: &Path, session: &GenerationSession, doc: &PostDocument) {
        let Some(notifier) = self.notifier.as_ref() else {
            debug!("Review notification is disabled");
            return;
        };
        let markdown = match frontmatter::encode(doc) {
            Ok(markdown) => markdown,
            Err(e) => {
                warn!("Not sending review notification for '{}': {}", slug, e);
                return;
            }
        };

        let notice = ReviewNotice::new(&self.subject_prefix, title, slug, path.to_path_buf(), &session.sections, markdown);
        let sent = match tokio::time::timeout(self.settings.timeout, notifier.notify(&notice)).await {
            Ok(res) => res,
            Err(_) => Err(NotifyError::Timeout(self.settings.timeout)),
        };
        match sent {
            Ok(()) => info!("Sent review notification for '{}'", slug),
            Err(e) => warn!("Review notification for '{}' failed: {}", slug, e),
        }
    }

    fn draft_slug(seo_title: &str, topic: &str) -> String {
        [seo_title, topic].iter()
            .map(|candidate| derive_slug(candidate))
            .find(|slug| !slug.is_empty())
            .unwrap_or_else(|| UNTITLED_SLUG.to_string())
    }

    async fn bounded<T, F>(&self, call: F) -> std::result::Result<T, GenerationError>
    where
        F: Future<Output=std::result::Result<T, GenerationError>>,
    {
        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(GenerationError::Timeout(self.settings.timeout)),
        }
    }

    async fn request_outline(&self, session: &GenerationSession) -> Outline {
        let topic = session.topic.as_str();
        let res = self.bounded(self.capability.generate_outline(topic, &session.context)).await;
        match res {
            Ok(value) => Outline::from_value(&value).unwrap_or_else(|| {
                warn!("Malformed outline for '{}', using the default outline: {}", topic, value);
                Outline::fallback(topic)
            }),
            Err(e) => {
                warn!("Outline generation for '{}' failed, using the default outline: {}", topic, e);
                Outline::fallback(topic)
            }
        }
    }

    async fn request_section(&self, section_title: &str, outline: &Outline, session: &GenerationSession) -> String {
        let topic = session.topic.as_str();
        let call = self.capability.generate_section(section_title, topic, outline, &session.context);
        match self.bounded(call).await {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => {
                warn!("Empty content for section '{}'", section_title);
                section_placeholder(section_title)
            }
            Err(e) => {
                warn!("Content generation for section '{}' failed: {}", section_title, e);
                section_placeholder(section_title)
            }
        }
    }

    async fn request_seo(&self, full_text: &str, topic: &str) -> SeoMeta {
        match self.bounded(self.capability.generate_seo_meta(full_text, topic)).await {
            Ok(value) => SeoMeta::from_value(&value).unwrap_or_else(|| {
                warn!("Malformed SEO metadata for '{}', using defaults: {}", topic, value);
                SeoMeta::fallback(topic)
            }),
            Err(e) => {
                warn!("SEO generation for '{}' failed, using defaults: {}", topic, e);
                SeoMeta::fallback(topic)
            }
        }
    }
}
