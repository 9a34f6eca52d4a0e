use std::path::{Component, Path, PathBuf};

use crate::error::{ContentError, Result};

/// Joins a client supplied relative path onto `base`.
///
/// Leading separators are ignored so `/a.md` means `base/a.md`. `.` and `..`
/// are resolved lexically and the result must stay inside `base` (it may be
/// `base` itself). The filesystem is never consulted, so symlinks inside the
/// root are trusted.
pub fn safe_join(base: &Path, candidate: &str) -> Result<PathBuf> {
    let traversal = || ContentError::PathTraversal {
        base: base.to_path_buf(),
        candidate: candidate.to_string(),
    };

    let trimmed = candidate.trim_start_matches(|c| c == '/' || c == '\\');
    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(traversal());
                }
            }
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    Ok(base.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names() {
        let base = Path::new("content/drafts");
        assert_eq!(safe_join(base, "post.md").unwrap(), base.join("post.md"));
        assert_eq!(safe_join(base, "/post.md").unwrap(), base.join("post.md"));
        assert_eq!(safe_join(base, "./a/../post.md").unwrap(), base.join("post.md"));
        assert_eq!(safe_join(base, "").unwrap(), base.to_path_buf());
    }

    #[test]
    fn test_escapes_are_rejected() {
        let base = Path::new("content/drafts");
        for candidate in ["../../etc/passwd", "..", "a/../../b.md", "//../x.md", "./../drafts2/a.md"] {
            let res = safe_join(base, candidate);
            assert!(
                matches!(res, Err(ContentError::PathTraversal { .. })),
                "{} should be rejected", candidate
            );
        }
    }

    #[test]
    fn test_relative_base() {
        let base = Path::new(".");
        assert!(safe_join(base, "../outside.md").is_err());
        assert_eq!(safe_join(base, "inside.md").unwrap(), Path::new("./inside.md"));
    }
}
