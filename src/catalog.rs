//! Read-only queries over the published collection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::store::PublishedEntry;

pub const MAX_RELATED_POSTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedPost {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

pub fn post_url(slug: &str) -> String {
    format!("/blog/{}/", slug)
}

/// Every tag used by a published post, in first-seen order.
pub fn unique_tags(entries: &[PublishedEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries.iter()
        .flat_map(|entry| entry.tags.iter())
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Posts of a category, newest first. Undated posts go last.
pub fn posts_by_category<'a>(entries: &'a [PublishedEntry], category: &str) -> Vec<&'a PublishedEntry> {
    let mut posts: Vec<&PublishedEntry> = entries.iter()
        .filter(|entry| entry.category.as_deref() == Some(category))
        .collect();
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts
}

pub fn random_post<'a, R: Rng + ?Sized>(entries: &'a [PublishedEntry], rng: &mut R) -> Option<&'a PublishedEntry> {
    entries.choose(rng)
}

/// Posts sharing tags with `slug` (most shared first, then newest), topped up
/// with posts of the same category. `None` when `slug` is not published.
pub fn related_posts(slug: &str, entries: &[PublishedEntry], max_posts: usize) -> Option<Vec<RelatedPost>> {
    let current = entries.iter().find(|entry| entry.slug == slug)?;

    let mut scored: Vec<(usize, &PublishedEntry)> = entries.iter()
        .filter(|entry| entry.slug != current.slug)
        .map(|entry| {
            let shared = entry.tags.iter().filter(|tag| current.tags.contains(tag)).count();
            (shared, entry)
        })
        .collect();
    scored.sort_by(|(a_shared, a), (b_shared, b)| {
        b_shared.cmp(a_shared).then_with(|| b.date.cmp(&a.date))
    });

    let mut related: Vec<&PublishedEntry> = scored.iter()
        .filter(|(shared, _)| *shared > 0)
        .map(|(_, entry)| *entry)
        .collect();

    if related.len() < max_posts {
        if let Some(category) = current.category.as_deref() {
            related.extend(scored.iter()
                .filter(|(shared, entry)| *shared == 0 && entry.category.as_deref() == Some(category))
                .map(|(_, entry)| *entry));
        }
    }

    Some(related.into_iter()
        .take(max_posts)
        .map(|entry| RelatedPost {
            title: entry.title.clone(),
            url: post_url(&entry.slug),
            date: entry.date,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn entry(slug: &str, tags: &[&str], category: Option<&str>, day: Option<u32>) -> PublishedEntry {
        PublishedEntry {
            title: format!("Title {}", slug),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            slug: slug.to_string(),
            path: PathBuf::from(format!("{}.md", slug)),
            category: category.map(|c| c.to_string()),
            date: day.map(|d| Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()),
        }
    }

    fn entries() -> Vec<PublishedEntry> {
        vec![
            entry("current", &["rust", "async", "web"], Some("Code"), Some(10)),
            entry("one-tag-new", &["rust"], None, Some(20)),
            entry("two-tags", &["rust", "async"], Some("Life"), Some(1)),
            entry("one-tag-old", &["web"], None, Some(2)),
            entry("same-category", &["cooking"], Some("Code"), Some(5)),
            entry("unrelated", &["cooking"], Some("Life"), None),
        ]
    }

    #[test]
    fn test_unique_tags() {
        assert_eq!(unique_tags(&entries()), ["rust", "async", "web", "cooking"]);
    }

    #[test]
    fn test_posts_by_category() {
        let entries = entries();
        let slugs: Vec<&str> = posts_by_category(&entries, "Life").iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, ["two-tags", "unrelated"]);
        assert!(posts_by_category(&entries, "Nope").is_empty());
    }

    #[test]
    fn test_related_posts_ranked_by_tags_then_date() {
        let related = related_posts("current", &entries(), MAX_RELATED_POSTS).unwrap();
        let urls: Vec<&str> = related.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["/blog/two-tags/", "/blog/one-tag-new/", "/blog/one-tag-old/"]);
    }

    #[test]
    fn test_related_posts_topped_up_by_category() {
        let related = related_posts("current", &entries(), 5).unwrap();
        let urls: Vec<&str> = related.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["/blog/two-tags/", "/blog/one-tag-new/", "/blog/one-tag-old/", "/blog/same-category/"]);

        assert!(related_posts("missing", &entries(), 3).is_none());
    }

    #[test]
    fn test_random_post() {
        let entries = entries();
        let mut rng = StdRng::seed_from_u64(7);
        let post = random_post(&entries, &mut rng).unwrap();
        assert!(entries.iter().any(|e| e.slug == post.slug));
        assert!(random_post(&[], &mut rng).is_none());
    }
}
