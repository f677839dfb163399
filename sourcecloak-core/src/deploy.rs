//! Secure deployment: backup, transform-and-replace, optional packaging.
//!
//! The sequence is strict: the operator confirmation gate runs first and a
//! verified backup must exist before any original is overwritten. Replacement
//! is per file via temp-write-then-rename; one file's failure never rolls
//! back already-replaced files.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::batch::{BatchResult, BatchSummary};
use crate::errors::{Result, SourceCloakError};
use crate::obfuscator::Obfuscator;
use crate::pipeline::{ObfuscationLevel, PassOptions};
use crate::walker::FileWalker;

/// Terminal state of a secure-deploy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    /// All candidates processed successfully.
    Complete,
    /// Some candidates failed; the rest were still processed.
    Partial,
    /// Operator declined confirmation; no side effects were performed.
    Aborted,
}

#[derive(Debug)]
pub struct DeployOutcome {
    pub state: DeployState,
    pub results: Vec<BatchResult>,
    pub backup_path: Option<PathBuf>,
    pub package_path: Option<PathBuf>,
}

impl DeployOutcome {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::of(&self.results)
    }
}

/// Run the secure-deploy state machine over `source` (a file or a directory).
///
/// `confirm` is the operator gate; it receives a description of what is about
/// to happen and returns whether to proceed. Nothing is touched when it
/// declines.
#[allow(clippy::too_many_arguments)]
pub async fn secure_deploy<F>(
    obfuscator: &Obfuscator,
    backups: &BackupManager,
    walker: &FileWalker,
    source: &Path,
    output: Option<&Path>,
    level: ObfuscationLevel,
    options: &PassOptions,
    create_package: bool,
    confirm: &mut F,
) -> Result<DeployOutcome>
where
    F: FnMut(&str) -> bool,
{
    if !source.exists() {
        return Err(SourceCloakError::InputNotFound(source.to_path_buf()));
    }

    let prompt = format!(
        "Replace originals under {} with obfuscated code (level: {level})? \
         Originals will be moved to a secure backup location.",
        source.display()
    );
    if !confirm(&prompt) {
        info!("secure deploy aborted by operator");
        return Ok(DeployOutcome {
            state: DeployState::Aborted,
            results: Vec::new(),
            backup_path: None,
            package_path: None,
        });
    }

    // The backup must be complete and verified before any replace begins.
    let backup_path = backups.create_secure_backup(source).await?;

    let candidates = if source.is_dir() {
        walker.discover(source)?
    } else {
        vec![source.to_path_buf()]
    };

    let mut results = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let result = match replace_with_stub(obfuscator, candidate, level, options).await {
            Ok(()) => BatchResult::success(
                candidate.clone(),
                Some(candidate.clone()),
                "deployed in place",
            ),
            Err(e) => {
                warn!(file = %candidate.display(), error = %e, "deploy failed for file");
                BatchResult::error(candidate.clone(), e.to_string())
            }
        };
        results.push(result);
    }

    let package_path = if create_package {
        let output_dir = output
            .map(Path::to_path_buf)
            .or_else(|| source.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Some(create_deployment_package(source, &output_dir)?)
    } else {
        None
    };

    let summary = BatchSummary::of(&results);
    let state = if summary.all_succeeded() {
        DeployState::Complete
    } else {
        DeployState::Partial
    };
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "secure deploy finished"
    );

    Ok(DeployOutcome {
        state,
        results,
        backup_path: Some(backup_path),
        package_path,
    })
}

/// Transform one file and atomically rename the stub over the original.
///
/// The stub is first written to a temp file in the same directory so the
/// final rename stays on one filesystem. On rename failure the original is
/// untouched and the temp file is left behind for inspection.
async fn replace_with_stub(
    obfuscator: &Obfuscator,
    path: &Path,
    level: ObfuscationLevel,
    options: &PassOptions,
) -> Result<()> {
    let source = tokio::fs::read_to_string(path).await?;
    let stub = obfuscator.obfuscate_source(&source, level, options);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|source| SourceCloakError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    temp.write_all(stub.as_bytes())
        .map_err(|source| SourceCloakError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    temp.persist(path)
        .map_err(|e| SourceCloakError::Replace {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

/// Bundle the deployed tree into `<output>/secure_deploy_<timestamp>.tar`.
fn create_deployment_package(source: &Path, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let package_path = output_dir.join(format!("secure_deploy_{stamp}.tar"));

    let file = std::fs::File::create(&package_path).map_err(|source| SourceCloakError::Write {
        path: package_path.clone(),
        source,
    })?;
    let mut builder = tar::Builder::new(file);

    let root_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    if source.is_dir() {
        builder.append_dir_all(&root_name, source)?;
    } else {
        builder.append_path_with_name(source, &root_name)?;
    }
    builder.finish()?;

    info!(package = %package_path.display(), "deployment package created");
    Ok(package_path)
}
