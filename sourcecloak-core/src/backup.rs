//! Backup creation and restore.
//!
//! Backups are written under the configured backup directory, which must not
//! be web-servable. They are never deleted automatically; cleanup is an
//! operator concern.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::info;
use walkdir::WalkDir;

use crate::errors::{Result, SourceCloakError};

static BACKUP_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^backup_\d+_(.+)$").unwrap()
});

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy one file to `backup_<unix seconds>_<name>` in the backup
    /// directory and return the backup path.
    pub async fn create_backup(&self, path: &Path, custom_name: Option<&str>) -> Result<PathBuf> {
        if !path.exists() {
            return Err(SourceCloakError::InputNotFound(path.to_path_buf()));
        }
        fs::create_dir_all(&self.backup_dir).await?;

        let name = match custom_name {
            Some(name) => name.to_string(),
            None => file_name_of(path)?,
        };
        let backup_path = self
            .backup_dir
            .join(format!("backup_{}_{}", Utc::now().timestamp(), name));

        fs::copy(path, &backup_path).await?;
        info!(original = %path.display(), backup = %backup_path.display(), "backup created");
        Ok(backup_path)
    }

    /// Copy a file or a whole directory tree into a timestamped
    /// `secure_deploy_*` subdirectory. Every copied file is verified against
    /// the original's byte length before this returns, so callers may treat a
    /// returned `Ok` as "backup complete" and begin replacing originals.
    pub async fn create_secure_backup(&self, path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            return Err(SourceCloakError::InputNotFound(path.to_path_buf()));
        }

        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let backup_root = self.backup_dir.join(format!("secure_deploy_{stamp}"));
        fs::create_dir_all(&backup_root).await?;

        let target = backup_root.join(file_name_of(path)?);
        if path.is_dir() {
            copy_tree_verified(path, &target).await?;
        } else {
            copy_file_verified(path, &target).await?;
        }

        info!(source = %path.display(), backup = %target.display(), "secure backup complete");
        Ok(target)
    }

    /// Names of backup files currently present, sorted.
    pub async fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.backup_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Restore a backup by its file name.
    ///
    /// With an explicit `target`, the backup is copied there. Otherwise the
    /// original file name is recovered from the `backup_<ts>_<name>` pattern
    /// and `search_root` is searched for a file of that name, taking the
    /// first match.
    pub async fn restore(
        &self,
        backup_name: &str,
        target: Option<&Path>,
        search_root: &Path,
    ) -> Result<PathBuf> {
        let backup_path = self.backup_dir.join(backup_name);
        if !backup_path.exists() {
            return Err(SourceCloakError::InputNotFound(backup_path));
        }

        let destination = match target {
            Some(target) => target.to_path_buf(),
            None => {
                let original_name = BACKUP_NAME_REGEX
                    .captures(backup_name)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| {
                        SourceCloakError::Configuration(format!(
                            "cannot derive original name from backup '{backup_name}'"
                        ))
                    })?;
                find_by_file_name(search_root, &original_name).ok_or_else(|| {
                    SourceCloakError::InputNotFound(search_root.join(&original_name))
                })?
            }
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&backup_path, &destination).await?;
        info!(backup = %backup_path.display(), restored = %destination.display(), "backup restored");
        Ok(destination)
    }
}

async fn copy_file_verified(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(source, target).await?;

    let source_len = fs::metadata(source).await?.len();
    let target_len = fs::metadata(target).await?.len();
    if source_len != target_len {
        return Err(SourceCloakError::Write {
            path: target.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("backup size mismatch: {source_len} != {target_len}"),
            ),
        });
    }
    Ok(())
}

async fn copy_tree_verified(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| SourceCloakError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| SourceCloakError::Configuration(e.to_string()))?;
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).await?;
        } else {
            copy_file_verified(entry.path(), &dest).await?;
        }
    }
    Ok(())
}

fn find_by_file_name(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            entry.file_type().is_file() && entry.file_name().to_string_lossy() == file_name
        })
        .map(|entry| entry.path().to_path_buf())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            SourceCloakError::Configuration(format!("path has no file name: {}", path.display()))
        })
}
