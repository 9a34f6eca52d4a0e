use std::path::{Path, PathBuf};

use spdlog::{debug, error, warn};

use crate::content::slug::sanitize_basename;
use crate::content::{FieldValue, PostDocument};
use crate::error::{ContentError, Result};
use crate::store::{Collection, ContentLocation, ContentStore, DraftEntry, FileStore, PublishedEntry};

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "mdx"];

/// The only component that reads or writes post files.
pub struct ContentRepository<S: ContentStore = FileStore> {
    store: S,
}

impl ContentRepository<FileStore> {
    pub fn from_dirs(drafts_dir: impl Into<PathBuf>, published_dir: impl Into<PathBuf>) -> Self {
        ContentRepository::new(FileStore::new(drafts_dir, published_dir))
    }
}

impl<S: ContentStore> ContentRepository<S> {
    pub fn new(store: S) -> Self {
        ContentRepository { store }
    }

    pub fn root(&self, collection: Collection) -> &Path {
        self.store.root(collection)
    }

    pub fn list_published(&self) -> Result<Vec<PublishedEntry>> {
        let mut entries = vec![];
        for location in self.store.list(Collection::Published)? {
            let doc = match self.store.get(&location) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping {}: {}", location, e);
                    continue;
                }
            };
            let Some(title) = doc.title() else {
                debug!("Skipping {}: no title", location);
                continue;
            };

            let fm = &doc.frontmatter;
            let date = fm.get("pubDate")
                .or_else(|| fm.get("date"))
                .and_then(FieldValue::as_date_time);

            entries.push(PublishedEntry {
                title: title.to_string(),
                tags: fm.tags(),
                slug: doc.slug().unwrap_or(location.stem()).to_string(),
                path: self.store.resolve(&location)?,
                category: fm.get_str("category").map(|c| c.to_string()),
                date,
            });
        }
        Ok(entries)
    }

    pub fn list_drafts(&self) -> Result<Vec<DraftEntry>> {
        let mut entries = vec![];
        for location in self.store.list(Collection::Drafts)? {
            match self.store.get(&location) {
                Ok(doc) => entries.push(DraftEntry {
                    title: doc.title().map(|t| t.to_string()),
                    description: doc.frontmatter.get_str("description").map(|d| d.to_string()),
                    status: doc.status().map(|s| s.to_string()),
                    file_name: location.file_name,
                }),
                Err(e) => warn!("Skipping {}: {}", location, e),
            }
        }
        Ok(entries)
    }

    /// Validates a client supplied draft path without touching the file.
    pub fn draft_location(&self, relative_path: &str) -> Result<ContentLocation> {
        let location = ContentLocation::drafts(relative_path.trim_start_matches(|c| c == '/' || c == '\\'));
        self.store.resolve(&location)?;
        Ok(location)
    }

    /// Finds `slug.md`, then `slug.mdx`, in the published collection.
    pub fn locate_published(&self, slug: &str) -> Result<ContentLocation> {
        for ext in MARKDOWN_EXTENSIONS {
            let location = ContentLocation::published(format!("{}.{}", slug, ext));
            self.store.resolve(&location)?;
            if self.store.exists(&location) {
                return Ok(location);
            }
        }
        Err(ContentError::NotFound(format!("published/{}", slug)))
    }

    pub fn read_draft(&self, relative_path: &str) -> Result<PostDocument> {
        let location = self.draft_location(relative_path)?;
        self.store.get(&location)
    }

    pub fn read_published(&self, slug: &str) -> Result<(ContentLocation, PostDocument)> {
        let location = self.locate_published(slug)?;
        let doc = self.store.get(&location)?;
        Ok((location, doc))
    }

    /// Writes `drafts/<slug>.md`, replacing whatever was there.
    pub fn write_draft(&self, slug: &str, doc: &PostDocument) -> Result<PathBuf> {
        let location = Self::draft_for_slug(slug)?;
        self.store.put(&location, doc)
    }

    pub fn draft_for_slug(slug: &str) -> Result<ContentLocation> {
        let name = sanitize_basename(slug)?;
        let stem = name
            .strip_suffix(".mdx")
            .or_else(|| name.strip_suffix(".md"))
            .unwrap_or(&name);
        if stem.is_empty() {
            return Err(ContentError::InvalidSlug(slug.to_string()));
        }
        Ok(ContentLocation::drafts(format!("{}.md", stem)))
    }

    pub fn write_published(&self, location: &ContentLocation, doc: &PostDocument) -> Result<PathBuf> {
        self.store.put(location, doc)
    }

    /// Reads a draft, lets `mutate` rewrite it and pick the published slug,
    /// writes `published/<slug>.md` and only then removes the draft.
    pub fn move_draft_to_published<F>(&self, relative_path: &str, mutate: F) -> Result<(PathBuf, PostDocument)>
    where
        F: FnOnce(&mut PostDocument) -> String,
    {
        let from = self.draft_location(relative_path)?;
        let mut doc = self.store.get(&from)?;
        let slug = mutate(&mut doc);
        let to = ContentLocation::published(format!("{}.md", slug));
        let path = self.relocate(&from, &to, &doc)?;
        Ok((path, doc))
    }

    /// Moves a published post back to drafts under the same file name.
    pub fn move_published_to_draft<F>(&self, slug: &str, mutate: F) -> Result<(PathBuf, PostDocument)>
    where
        F: FnOnce(&mut PostDocument),
    {
        let from = self.locate_published(slug)?;
        let mut doc = self.store.get(&from)?;
        mutate(&mut doc);
        let to = ContentLocation::drafts(from.file_name.clone());
        let path = self.relocate(&from, &to, &doc)?;
        Ok((path, doc))
    }

    pub fn delete_draft(&self, relative_path: &str) -> Result<()> {
        let location = self.draft_location(relative_path)?;
        self.store.delete(&location)
    }

    fn relocate(&self, from: &ContentLocation, to: &ContentLocation, doc: &PostDocument) -> Result<PathBuf> {
        let path = self.store.put(to, doc)?;
        // The copy is in place, a leftover source is a duplicate and not a loss
        if let Err(e) = self.store.delete(from) {
            error!("Wrote {} but could not remove {}: {}", to, from, e);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use crate::test_data::{DRAFT_DATA, PUBLISHED_DATA};

    use super::*;

    fn new_repo(tmp: &TempDir) -> ContentRepository {
        ContentRepository::from_dirs(tmp.path().join("drafts"), tmp.path().join("published"))
    }

    fn write_raw(tmp: &TempDir, collection: &str, name: &str, content: &str) {
        let dir = tmp.path().join(collection);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    /// Wraps a FileStore and records calls, optionally failing one kind of them.
    struct RecordingStore {
        inner: FileStore,
        calls: Mutex<Vec<String>>,
        fail_put: bool,
        fail_delete: bool,
    }

    impl RecordingStore {
        fn new(tmp: &TempDir) -> Self {
            RecordingStore {
                inner: FileStore::new(tmp.path().join("drafts"), tmp.path().join("published")),
                calls: Mutex::new(vec![]),
                fail_put: false,
                fail_delete: false,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ContentStore for RecordingStore {
        fn root(&self, collection: Collection) -> &Path {
            self.inner.root(collection)
        }

        fn get(&self, location: &ContentLocation) -> Result<PostDocument> {
            self.inner.get(location)
        }

        fn put(&self, location: &ContentLocation, doc: &PostDocument) -> Result<PathBuf> {
            self.calls.lock().unwrap().push(format!("put {}", location));
            if self.fail_put {
                return Err(ContentError::write(location.file_name.clone(), io::Error::new(io::ErrorKind::Other, "disk full")));
            }
            self.inner.put(location, doc)
        }

        fn delete(&self, location: &ContentLocation) -> Result<()> {
            self.calls.lock().unwrap().push(format!("delete {}", location));
            if self.fail_delete {
                return Err(ContentError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "read only")));
            }
            self.inner.delete(location)
        }

        fn exists(&self, location: &ContentLocation) -> bool {
            self.inner.exists(location)
        }

        fn list(&self, collection: Collection) -> Result<Vec<ContentLocation>> {
            self.inner.list(collection)
        }
    }

    #[test]
    fn test_list_published_skips_untitled_and_broken() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "published", "good.md", PUBLISHED_DATA);
        write_raw(&tmp, "published", "untitled.md", "---\ndescription: no title\n---\nbody\n");
        write_raw(&tmp, "published", "broken.md", "---\ntitle: never closed\n");

        let entries = new_repo(&tmp).list_published().unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.title, "Hello Astro");
        assert_eq!(entry.slug, "hello-astro");
        assert_eq!(entry.tags, ["astro", "web"]);
        assert_eq!(entry.category.as_deref(), Some("Code"));
        assert!(entry.date.is_some());
    }

    #[test]
    fn test_list_published_slug_falls_back_to_stem() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "published", "from-file.mdx", "---\ntitle: No slug\n---\n");

        let entries = new_repo(&tmp).list_published().unwrap();
        assert_eq!(entries[0].slug, "from-file");
    }

    #[test]
    fn test_list_drafts() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "drafts", "intro.md", DRAFT_DATA);

        let drafts = new_repo(&tmp).list_drafts().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].file_name, "intro.md");
        assert_eq!(drafts[0].title.as_deref(), Some("Intro to Testing"));
    }

    #[test]
    fn test_read_draft_errors() {
        let tmp = TempDir::new().unwrap();
        let repo = new_repo(&tmp);

        assert!(matches!(repo.read_draft("missing.md"), Err(ContentError::NotFound(_))));
        assert!(matches!(repo.read_draft("../../etc/passwd"), Err(ContentError::PathTraversal { .. })));
    }

    #[test]
    fn test_read_published_prefers_md_then_mdx() {
        let tmp = TempDir::new().unwrap();
        let repo = new_repo(&tmp);
        write_raw(&tmp, "published", "post.mdx", "---\ntitle: From mdx\n---\n");

        let (location, doc) = repo.read_published("post").unwrap();
        assert_eq!(location.file_name, "post.mdx");
        assert_eq!(doc.title(), Some("From mdx"));

        write_raw(&tmp, "published", "post.md", "---\ntitle: From md\n---\n");
        let (location, _) = repo.read_published("post").unwrap();
        assert_eq!(location.file_name, "post.md");

        assert!(matches!(repo.read_published("nope"), Err(ContentError::NotFound(_))));
        assert!(matches!(repo.read_published("../drafts/x"), Err(ContentError::PathTraversal { .. })));
    }

    #[test]
    fn test_write_draft_sanitizes_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let repo = new_repo(&tmp);
        let doc = PostDocument::new(Default::default(), "one");

        let path = repo.write_draft("../../escape", &doc).unwrap();
        assert_eq!(path, tmp.path().join("drafts").join("escape.md"));

        repo.write_draft("escape.md", &PostDocument::new(Default::default(), "two")).unwrap();
        assert_eq!(repo.read_draft("escape.md").unwrap().body, "two");

        assert!(matches!(repo.write_draft("..", &doc), Err(ContentError::InvalidSlug(_))));
        assert!(matches!(repo.write_draft(".md", &doc), Err(ContentError::InvalidSlug(_))));
    }

    #[test]
    fn test_move_draft_writes_before_delete() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "drafts", "intro.md", DRAFT_DATA);
        let repo = ContentRepository::new(RecordingStore::new(&tmp));

        let (path, doc) = repo.move_draft_to_published("intro.md", |_| "intro-to-testing".to_string()).unwrap();
        assert_eq!(path, tmp.path().join("published").join("intro-to-testing.md"));
        assert_eq!(doc.title(), Some("Intro to Testing"));
        assert_eq!(repo.store.calls(), ["put published/intro-to-testing.md", "delete drafts/intro.md"]);
        assert!(!tmp.path().join("drafts").join("intro.md").exists());
    }

    #[test]
    fn test_failed_write_keeps_draft() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "drafts", "intro.md", DRAFT_DATA);
        let mut store = RecordingStore::new(&tmp);
        store.fail_put = true;
        let repo = ContentRepository::new(store);

        let res = repo.move_draft_to_published("intro.md", |_| "intro".to_string());
        assert!(matches!(res, Err(ContentError::Write { .. })));
        assert_eq!(repo.store.calls(), ["put published/intro.md"]);
        assert!(tmp.path().join("drafts").join("intro.md").exists());
    }

    #[test]
    fn test_failed_delete_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "drafts", "intro.md", DRAFT_DATA);
        let mut store = RecordingStore::new(&tmp);
        store.fail_delete = true;
        let repo = ContentRepository::new(store);

        repo.move_draft_to_published("intro.md", |_| "intro".to_string()).unwrap();
        assert!(tmp.path().join("drafts").join("intro.md").exists());
        assert!(tmp.path().join("published").join("intro.md").exists());
    }

    #[test]
    fn test_move_published_to_draft_keeps_file_name() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "published", "hello-astro.mdx", PUBLISHED_DATA);
        let repo = new_repo(&tmp);

        let (path, doc) = repo.move_published_to_draft("hello-astro", |doc| {
            doc.frontmatter.set("draft", FieldValue::Bool(true));
        }).unwrap();

        assert_eq!(path, tmp.path().join("drafts").join("hello-astro.mdx"));
        assert_eq!(doc.frontmatter.get("draft"), Some(&FieldValue::Bool(true)));
        assert!(!tmp.path().join("published").join("hello-astro.mdx").exists());
    }

    #[test]
    fn test_delete_draft() {
        let tmp = TempDir::new().unwrap();
        write_raw(&tmp, "drafts", "intro.md", DRAFT_DATA);
        let repo = new_repo(&tmp);

        repo.delete_draft("/intro.md").unwrap();
        assert!(matches!(repo.delete_draft("intro.md"), Err(ContentError::NotFound(_))));
        assert!(matches!(repo.delete_draft("../published/x.md"), Err(ContentError::PathTraversal { .. })));
    }
}
