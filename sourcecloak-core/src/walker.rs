//! Candidate file discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{Result, SourceCloakError};

/// Recursively discovers candidate files by extension, honoring exclude
/// patterns. Each call walks the tree fresh; no state is cached between runs.
#[derive(Debug, Clone)]
pub struct FileWalker {
    extensions: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl FileWalker {
    pub fn new(extensions: Vec<String>, exclude_patterns: Vec<String>) -> Self {
        Self {
            extensions,
            exclude_patterns,
        }
    }

    /// List candidate files under `root` in stable (sorted) order.
    ///
    /// A file is a candidate iff its extension is in the include set and no
    /// exclude pattern occurs as a substring of its path.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Err(SourceCloakError::InputNotFound(root.to_path_buf()));
        }

        let mut candidates = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| SourceCloakError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.matches_extension(path) || self.is_excluded(path) {
                continue;
            }
            candidates.push(path.to_path_buf());
        }

        candidates.sort();
        Ok(candidates)
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| path_str.contains(pattern.as_str()))
    }

    fn matches_extension(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }
}
