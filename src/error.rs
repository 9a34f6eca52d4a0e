use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("path '{candidate}' escapes the collection root {}", base.display())]
    PathTraversal { base: PathBuf, candidate: String },

    #[error("malformed frontmatter: {0}")]
    MalformedFrontmatter(String),

    #[error("invalid slug '{0}'")]
    InvalidSlug(String),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("conflicting change: {0}")]
    Conflict(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ContentError {
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ContentError::Write {
            path: path.into(),
            source,
        }
    }

    /// Maps a read failure to `NotFound` when the file is simply absent.
    pub fn from_read(what: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ContentError::NotFound(what.to_string())
        } else {
            ContentError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_read_maps_not_found() {
        let err = ContentError::from_read("drafts/a.md", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, ContentError::NotFound(ref what) if what == "drafts/a.md"));

        let err = ContentError::from_read("drafts/a.md", io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(matches!(err, ContentError::Io(_)));
    }

    #[test]
    fn test_display() {
        let err = ContentError::PathTraversal {
            base: PathBuf::from("content/drafts"),
            candidate: "../../etc/passwd".to_string(),
        };
        assert_eq!(err.to_string(), "path '../../etc/passwd' escapes the collection root content/drafts");
    }
}
