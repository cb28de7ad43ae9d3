//! Path confinement: every path-taking tool is pinned to one root directory.
//!
//! Arguments are resolved against the root, `.`/`..` are folded lexically,
//! and the longest existing ancestor is canonicalized so a symlink cannot
//! point out of the root. Anything that lands outside fails closed.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path traversal denied: {path}")]
    PathTraversal { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// Resolves tool path arguments inside a single confinement root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard for `root`. The root must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathValidationError> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { root })
    }

    /// The canonical confinement root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root.
    ///
    /// Absolute arguments are accepted only when they already lie inside the
    /// root. The returned path need not exist (writes create it).
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let traversal = || PathValidationError::PathTraversal { path: path.into() };

        let input = Path::new(path);
        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        let normalized = normalize(&joined).ok_or_else(traversal)?;
        let resolved = canonicalize_existing_prefix(&normalized, MAX_LINK_HOPS).ok_or_else(traversal)?;

        if !resolved.starts_with(&self.root) {
            tracing::debug!(path, resolved = %resolved.display(), "Path escapes confinement root");
            return Err(traversal());
        }
        Ok(resolved)
    }

    /// Render `path` relative to the root for display to the model.
    pub fn display_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".into(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Fold `.` and `..` without touching the filesystem.
///
/// Returns `None` when `..` would climb above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Symlinks followed by hand before resolution gives up.
const MAX_LINK_HOPS: usize = 40;

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// remaining (not yet existing) components.
///
/// A dangling symlink on the way is followed through its target, so a link
/// pointing out of the root is caught even before the target exists.
/// Returns `None` for link cycles or unreadable links.
fn canonicalize_existing_prefix(path: &Path, hops: usize) -> Option<PathBuf> {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return Some(out);
        }
        if existing
            .symlink_metadata()
            .is_ok_and(|meta| meta.file_type().is_symlink())
        {
            let hops = hops.checked_sub(1)?;
            let target = std::fs::read_link(existing).ok()?;
            let mut next = normalize(&existing.parent()?.join(target))?;
            for part in rest.iter().rev() {
                next.push(part);
            }
            return canonicalize_existing_prefix(&next, hops);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Some(path.to_path_buf()),
        }
    }
}
