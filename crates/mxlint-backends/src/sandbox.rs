//! Sandboxed file access for script rules.
//!
//! Paths are checked lexically against the root, then again after symlinks
//! are followed.

use std::path::{Component, Path, PathBuf};

use mxlint_types::{LintError, Result};

/// Restricted file access handed to script rules.
///
/// Every path argument, relative or absolute, is resolved against `root` and
/// must still lie inside it afterwards. Escapes are rejected, never clamped.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let absolute = std::path::absolute(root.as_ref())?;
        Ok(Self {
            root: normalize(&absolute),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the root if it is not absolute, then check
    /// that it did not leave the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let requested = Path::new(path);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let resolved = normalize(&joined);
        if resolved.starts_with(&self.root) && !self.links_outside(&resolved) {
            Ok(resolved)
        } else {
            Err(LintError::OutsideWorkingDirectory {
                path: path.to_string(),
                root: self.root.clone(),
            })
        }
    }

    /// Whether an existing path only lies inside the root before its
    /// symlinks are followed. Paths that do not exist cannot escape.
    fn links_outside(&self, resolved: &Path) -> bool {
        let Ok(target) = std::fs::canonicalize(resolved) else {
            return false;
        };
        match std::fs::canonicalize(&self.root) {
            Ok(root) => !target.starts_with(root),
            Err(_) => true,
        }
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved).map_err(|source| LintError::ReadFile {
            path: resolved,
            source,
        })
    }

    /// Entry names of a directory, sorted.
    pub fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let resolved = self.resolve(path)?;
        let read_dir = std::fs::read_dir(&resolved).map_err(|source| LintError::ReadFile {
            path: resolved.clone(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in read_dir {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// `false` for a path that does not exist.
    pub fn is_dir(&self, path: &str) -> Result<bool> {
        let resolved = self.resolve(path)?;
        match std::fs::metadata(&resolved) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Lexically collapse `.` and `..` components.
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
