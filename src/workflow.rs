//! Draft/publish transitions over the content repository.
//!
//! Each transition holds the locks of every location it touches for its
//! whole duration, so two requests on the same post never interleave.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use spdlog::{debug, info};

use crate::content::slug::derive_slug_or;
use crate::content::{FieldValue, PostDocument, STATUS_DRAFT, STATUS_PUBLISHED};
use crate::error::{ContentError, Result};
use crate::store::{ContentLocation, ContentRepository, ContentStore, FileStore};

const UNTITLED_SLUG: &str = "untitled";
const APPROVE_ATTEMPTS: usize = 3;

/// In-memory lock per `collection:file` key.
#[derive(Default)]
pub struct SlugLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SlugLocks {
    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Drops the entries nobody else holds or waits on.
    fn release(&self, keys: &[String], handles: Vec<Arc<Mutex<()>>>) {
        drop(handles);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if locks.get(key).is_some_and(|handle| Arc::strong_count(handle) == 1) {
                locks.remove(key);
            }
        }
    }

    /// Runs `f` while holding the lock of every location, taken in sorted key order.
    pub fn with_locked<T>(&self, locations: &[&ContentLocation], f: impl FnOnce() -> T) -> T {
        let mut keys: Vec<String> = locations.iter().map(|loc| loc.key()).collect();
        keys.sort();
        keys.dedup();

        let handles: Vec<Arc<Mutex<()>>> = keys.iter().map(|key| self.handle(key)).collect();
        let res = {
            let _guards: Vec<MutexGuard<()>> = handles.iter()
                .map(|handle| handle.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            f()
        };
        self.release(&keys, handles);

        res
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub slug: String,
    pub published_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unpublished {
    pub slug: String,
    pub draft_path: PathBuf,
}

pub struct ContentWorkflow<S: ContentStore = FileStore> {
    repository: ContentRepository<S>,
    locks: SlugLocks,
}

impl<S: ContentStore> ContentWorkflow<S> {
    pub fn new(repository: ContentRepository<S>) -> Self {
        ContentWorkflow {
            repository,
            locks: SlugLocks::default(),
        }
    }

    pub fn repository(&self) -> &ContentRepository<S> {
        &self.repository
    }

    /// Slug a draft will be published under.
    fn target_slug(doc: &PostDocument) -> String {
        match doc.slug() {
            Some(slug) => slug.trim().to_string(),
            None => derive_slug_or(doc.title(), UNTITLED_SLUG),
        }
    }

    /// Draft -> Published. The draft is removed only after the published copy is written.
    pub fn approve(&self, relative_draft_path: &str) -> Result<Approval> {
        let from = self.repository.draft_location(relative_draft_path)?;

        for _ in 0..APPROVE_ATTEMPTS {
            let slug = Self::target_slug(&self.repository.read_draft(relative_draft_path)?);
            let to = ContentLocation::published(format!("{}.md", slug));

            let approved = self.locks.with_locked(&[&from, &to], || -> Result<Option<Approval>> {
                // The draft may have been edited before its lock was taken
                if Self::target_slug(&self.repository.read_draft(relative_draft_path)?) != slug {
                    return Ok(None);
                }

                let (published_path, _) = self.repository.move_draft_to_published(relative_draft_path, |doc| {
                    doc.frontmatter.set("slug", FieldValue::text(slug.as_str()));
                    doc.frontmatter.set("status", FieldValue::text(STATUS_PUBLISHED));
                    doc.frontmatter.set("pubDate", FieldValue::DateTime(Utc::now()));
                    slug.clone()
                })?;

                info!("Approved {} as {}", from, published_path.display());
                Ok(Some(Approval { slug: slug.clone(), published_path }))
            })?;

            match approved {
                Some(approval) => return Ok(approval),
                None => debug!("Slug of {} changed while waiting for its lock, retrying", from),
            }
        }

        Err(ContentError::Conflict(format!("{} kept changing while it was being approved", from)))
    }

    /// Draft -> Deleted.
    pub fn reject(&self, relative_draft_path: &str) -> Result<()> {
        let location = self.repository.draft_location(relative_draft_path)?;
        self.locks.with_locked(&[&location], || {
            self.repository.delete_draft(relative_draft_path)?;
            info!("Rejected {}", location);
            Ok(())
        })
    }

    /// Published -> Draft, keeping the file name.
    pub fn unpublish(&self, slug: &str) -> Result<Unpublished> {
        let from = self.repository.locate_published(slug)?;
        let to = ContentLocation::drafts(from.file_name.clone());

        self.locks.with_locked(&[&from, &to], || {
            let (draft_path, _) = self.repository.move_published_to_draft(slug, |doc| {
                let fm = &mut doc.frontmatter;
                fm.set("draft", FieldValue::Bool(true));
                fm.remove("pubDate");
                if fm.get_str("status") == Some(STATUS_PUBLISHED) {
                    fm.set("status", FieldValue::text(STATUS_DRAFT));
                }
            })?;

            info!("Unpublished {} to {}", from, draft_path.display());
            Ok(Unpublished {
                slug: slug.to_string(),
                draft_path,
            })
        })
    }

    /// Creates or replaces `drafts/<slug>.md`.
    pub fn save_draft(&self, slug: &str, doc: &PostDocument) -> Result<PathBuf> {
        let location = ContentRepository::<S>::draft_for_slug(slug)?;
        self.locks.with_locked(&[&location], || self.repository.write_draft(slug, doc))
    }

    /// Edits a published post in place.
    pub fn save_published(&self, slug: &str, mut doc: PostDocument) -> Result<PathBuf> {
        let location = self.repository.locate_published(slug)?;
        doc.frontmatter.set("updatedDate", FieldValue::DateTime(Utc::now()));
        doc.frontmatter.set("draft", FieldValue::Bool(false));

        self.locks.with_locked(&[&location], || {
            // The post may have been unpublished while we waited for the lock
            self.repository.locate_published(slug)?;
            let path = self.repository.write_published(&location, &doc)?;
            info!("Updated {}", location);
            Ok(path)
        })
    }
}
