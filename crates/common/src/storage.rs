//! Sandboxed local file storage for generated artifacts

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Writes files below a fixed root directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create storage rooted at `root`. Relative roots are resolved against
    /// the current directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self {
            root: normalize(&root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative_path` inside the root
    ///
    /// The check is lexical first, then repeated on the real location of the
    /// deepest part of the path that already exists, so a symlink below the
    /// root cannot lead outside it.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        if relative_path.starts_with('/') || relative_path.starts_with('\\') {
            return Err(Error::AbsolutePath(relative_path.to_string()));
        }
        let relative = Path::new(relative_path);
        if relative.is_absolute() || relative.has_root() {
            return Err(Error::AbsolutePath(relative_path.to_string()));
        }

        let full = normalize(&self.root.join(relative));
        if !full.starts_with(&self.root) || !self.stays_inside(&full)? {
            return Err(Error::PathTraversal(relative_path.to_string()));
        }
        Ok(full)
    }

    /// Whether the existing prefix of `full` really lives under the root
    fn stays_inside(&self, full: &Path) -> Result<bool> {
        let real_root = match self.root.canonicalize() {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };

        let existing = full
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(self.root.as_path());
        match existing.canonicalize() {
            Ok(real) => Ok(real.starts_with(&real_root)),
            // dangling symlink: writing through it would create its target
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `content` as UTF-8, creating parent directories. Returns the full path.
    pub fn save_file(&self, relative_path: &str, content: &str) -> Result<PathBuf> {
        let full = self.resolve(relative_path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, content)?;
        debug!("Saved {} ({} bytes)", full.display(), content.len());
        Ok(full)
    }
}

/// Lexically collapse `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
