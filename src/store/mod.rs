use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::PostDocument;
use crate::error::Result;

pub mod file_store;
pub mod repository;
pub mod safe_path;

pub use file_store::FileStore;
pub use repository::ContentRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Drafts,
    Published,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Drafts => "drafts",
            Collection::Published => "published",
        }
    }
}

/// Where a document lives: a collection and a file name relative to its root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentLocation {
    pub collection: Collection,
    pub file_name: String,
}

impl ContentLocation {
    pub fn new(collection: Collection, file_name: impl Into<String>) -> Self {
        ContentLocation {
            collection,
            file_name: file_name.into(),
        }
    }

    pub fn drafts(file_name: impl Into<String>) -> Self {
        ContentLocation::new(Collection::Drafts, file_name)
    }

    pub fn published(file_name: impl Into<String>) -> Self {
        ContentLocation::new(Collection::Published, file_name)
    }

    /// The file name without its markdown extension.
    pub fn stem(&self) -> &str {
        self.file_name
            .strip_suffix(".mdx")
            .or_else(|| self.file_name.strip_suffix(".md"))
            .unwrap_or(&self.file_name)
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.collection.name(), self.file_name)
    }
}

impl fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection.name(), self.file_name)
    }
}

/// A published post as the catalog and the duplicate detector see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEntry {
    pub title: String,
    pub tags: Vec<String>,
    pub slug: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEntry {
    pub file_name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Key/value access to documents. Implementations own the bytes on disk.
pub trait ContentStore: Send + Sync {
    fn root(&self, collection: Collection) -> &Path;

    fn get(&self, location: &ContentLocation) -> Result<PostDocument>;

    /// Writes the document, replacing any previous content, and returns its path.
    fn put(&self, location: &ContentLocation, doc: &PostDocument) -> Result<PathBuf>;

    fn delete(&self, location: &ContentLocation) -> Result<()>;

    fn exists(&self, location: &ContentLocation) -> bool;

    fn list(&self, collection: Collection) -> Result<Vec<ContentLocation>>;

    /// Filesystem path of a location, refusing names that leave the collection root.
    fn resolve(&self, location: &ContentLocation) -> Result<PathBuf> {
        safe_path::safe_join(self.root(location.collection), &location.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_stem_and_key() {
        let loc = ContentLocation::published("hello.mdx");
        assert_eq!(loc.stem(), "hello");
        assert_eq!(loc.key(), "published:hello.mdx");
        assert_eq!(loc.to_string(), "published/hello.mdx");

        let loc = ContentLocation::drafts("notes.txt");
        assert_eq!(loc.stem(), "notes.txt");
    }
}
