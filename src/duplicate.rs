//! Gate that stops generation of topics the blog already covers.

use serde::Serialize;

use crate::store::PublishedEntry;

pub const DEFAULT_OVERLAP_THRESHOLD: usize = 3;

/// What the detector knows about an existing post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    pub title: String,
    pub tags: Vec<String>,
}

impl From<&PublishedEntry> for ContextEntry {
    fn from(entry: &PublishedEntry) -> Self {
        ContextEntry {
            title: entry.title.clone(),
            tags: entry.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateVerdict {
    Unique,
    ExactTitle { entry: ContextEntry },
    KeywordOverlap { entry: ContextEntry, overlap: usize },
}

impl DuplicateVerdict {
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, DuplicateVerdict::Unique)
    }

    pub fn matched_entry(&self) -> Option<&ContextEntry> {
        match self {
            DuplicateVerdict::Unique => None,
            DuplicateVerdict::ExactTitle { entry } => Some(entry),
            DuplicateVerdict::KeywordOverlap { entry, .. } => Some(entry),
        }
    }

    pub fn reason(&self) -> String {
        match self {
            DuplicateVerdict::Unique => "no similar content found".to_string(),
            DuplicateVerdict::ExactTitle { entry } => {
                format!("exact title match with existing post '{}'", entry.title)
            }
            DuplicateVerdict::KeywordOverlap { entry, overlap } => {
                format!("{} topic keywords overlap the tags of existing post '{}'", overlap, entry.title)
            }
        }
    }
}

/// Checks `candidate_title` against `entries` in order. The first entry that
/// matches by exact title or by keyword overlap decides the verdict, even if
/// a later entry would overlap more.
pub fn check(candidate_title: &str, entries: &[ContextEntry], overlap_threshold: usize) -> DuplicateVerdict {
    let title = candidate_title.trim().to_lowercase();
    let tokens: Vec<&str> = title.split_whitespace().collect();

    for entry in entries {
        if entry.title.trim().to_lowercase() == title {
            return DuplicateVerdict::ExactTitle { entry: entry.clone() };
        }

        let tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();
        let overlap = tokens.iter()
            .filter(|token| tags.iter().any(|tag| tag == *token))
            .count();
        if overlap >= overlap_threshold {
            return DuplicateVerdict::KeywordOverlap { entry: entry.clone(), overlap };
        }
    }

    DuplicateVerdict::Unique
}
