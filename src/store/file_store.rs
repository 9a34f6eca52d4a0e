use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use spdlog::trace;
use tempfile::NamedTempFile;

use crate::content::{frontmatter, PostDocument};
use crate::error::{ContentError, Result};
use crate::store::{Collection, ContentLocation, ContentStore};

/// Two flat directories of markdown files.
pub struct FileStore {
    drafts_dir: PathBuf,
    published_dir: PathBuf,
}

impl FileStore {
    pub fn new(drafts_dir: impl Into<PathBuf>, published_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            drafts_dir: drafts_dir.into(),
            published_dir: published_dir.into(),
        }
    }

    fn retrieve_files(dir: &Path) -> io::Result<Vec<String>> {
        let mut files = vec![];
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            // A collection nobody wrote to yet is just empty
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e),
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            if let Some(file_name) = entry.file_name().to_str() {
                if file_name.ends_with(".md") || file_name.ends_with(".mdx") {
                    files.push(file_name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Writes through a temp file in the target directory so readers never see a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ContentError::write(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ContentError::write(path, e))?;
    tmp.write_all(content).map_err(|e| ContentError::write(path, e))?;
    tmp.persist(path).map_err(|e| ContentError::write(path, e.error))?;
    Ok(())
}

impl ContentStore for FileStore {
    fn root(&self, collection: Collection) -> &Path {
        match collection {
            Collection::Drafts => &self.drafts_dir,
            Collection::Published => &self.published_dir,
        }
    }

    fn get(&self, location: &ContentLocation) -> Result<PostDocument> {
        let path = self.resolve(location)?;
        if !path.is_file() {
            return Err(ContentError::NotFound(location.to_string()));
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| ContentError::from_read(&location.to_string(), e))?;
        frontmatter::decode(&raw)
    }

    fn put(&self, location: &ContentLocation, doc: &PostDocument) -> Result<PathBuf> {
        let path = self.resolve(location)?;
        trace!("Writing {}", path.display());
        atomic_write(&path, frontmatter::encode(doc)?.as_bytes())?;
        Ok(path)
    }

    fn delete(&self, location: &ContentLocation) -> Result<()> {
        let path = self.resolve(location)?;
        if !path.is_file() {
            return Err(ContentError::NotFound(location.to_string()));
        }
        fs::remove_file(&path).map_err(|e| ContentError::from_read(&location.to_string(), e))
    }

    fn exists(&self, location: &ContentLocation) -> bool {
        self.resolve(location).map(|path| path.is_file()).unwrap_or(false)
    }

    fn list(&self, collection: Collection) -> Result<Vec<ContentLocation>> {
        let files = Self::retrieve_files(self.root(collection))?;
        Ok(files.into_iter()
            .map(|file_name| ContentLocation::new(collection, file_name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::content::{FieldValue, Frontmatter};

    use super::*;

    fn new_store(tmp: &TempDir) -> FileStore {
        FileStore::new(tmp.path().join("drafts"), tmp.path().join("published"))
    }

    fn sample_doc(title: &str) -> PostDocument {
        let fm: Frontmatter = vec![("title", FieldValue::text(title))].into_iter().collect();
        PostDocument::new(fm, "\nBody\n")
    }

    #[test]
    fn test_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let store = new_store(&tmp);
        let loc = ContentLocation::drafts("first.md");

        assert!(!store.exists(&loc));
        let path = store.put(&loc, &sample_doc("First")).unwrap();
        assert_eq!(path, tmp.path().join("drafts").join("first.md"));
        assert!(store.exists(&loc));
        assert_eq!(store.get(&loc).unwrap().title(), Some("First"));

        store.put(&loc, &sample_doc("Second")).unwrap();
        assert_eq!(store.get(&loc).unwrap().title(), Some("Second"));

        store.delete(&loc).unwrap();
        assert!(matches!(store.get(&loc), Err(ContentError::NotFound(_))));
        assert!(matches!(store.delete(&loc), Err(ContentError::NotFound(_))));
    }

    #[test]
    fn test_list_only_markdown_files() {
        let tmp = TempDir::new().unwrap();
        let store = new_store(&tmp);

        assert!(store.list(Collection::Published).unwrap().is_empty());

        let published = tmp.path().join("published");
        fs::create_dir_all(published.join("nested.md")).unwrap();
        fs::write(published.join("b.mdx"), "---\ntitle: B\n---\n").unwrap();
        fs::write(published.join("a.md"), "---\ntitle: A\n---\n").unwrap();
        fs::write(published.join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = store.list(Collection::Published).unwrap()
            .into_iter()
            .map(|loc| loc.file_name)
            .collect();
        assert_eq!(names, ["a.md", "b.mdx"]);
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let tmp = TempDir::new().unwrap();
        let store = new_store(&tmp);
        let loc = ContentLocation::drafts("../published/a.md");

        assert!(matches!(store.get(&loc), Err(ContentError::PathTraversal { .. })));
        assert!(matches!(store.put(&loc, &sample_doc("x")), Err(ContentError::PathTraversal { .. })));
        assert!(!store.exists(&loc));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("deep").join("file.md");
        atomic_write(&target, b"hello").unwrap();
        atomic_write(&target, b"world").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "world");
        assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }
}
