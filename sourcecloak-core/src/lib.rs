//! SourceCloak: reversible PHP source obfuscation library
//!
//! The core transform is a deterministic, keyless encoding (base64 followed
//! by character reversal) behind an optional chain of cosmetic text passes.
//! It is exactly invertible and offers no protection against a motivated
//! reader; the value is in the batch, backup and deployment workflow around
//! it.

pub mod analyzer;
pub mod backup;
pub mod batch;
pub mod config;
pub mod deploy;
pub mod encoder;
pub mod errors;
pub mod license;
pub mod obfuscator;
pub mod pipeline;
pub mod walker;
pub mod wrapper;

// Re-exports
pub use analyzer::{analyze, AnalysisResult};
pub use backup::BackupManager;
pub use batch::{BatchResult, BatchStatus, BatchSummary};
pub use config::CloakConfig;
pub use deploy::{DeployOutcome, DeployState};
pub use errors::{Result, SourceCloakError};
pub use license::{LicenseInfo, LicenseManager};
pub use obfuscator::Obfuscator;
pub use pipeline::{ObfuscationLevel, PassOptions};
pub use walker::FileWalker;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

/// Main library interface.
///
/// Wires the configured components together and enforces the fail-closed
/// license gate: every operation validates the license before touching any
/// file.
pub struct SourceCloak {
    config: CloakConfig,
    license: LicenseManager,
    obfuscator: Obfuscator,
    walker: FileWalker,
    backups: BackupManager,
}

impl SourceCloak {
    pub fn new(config: CloakConfig) -> Self {
        let license = LicenseManager::new(config.license_key.clone());
        let obfuscator = Obfuscator::new(&config);
        let walker = FileWalker::new(
            config.include_extensions.clone(),
            config.exclude_patterns.clone(),
        );
        let backups = BackupManager::new(config.backup_dir.clone());
        Self {
            config,
            license,
            obfuscator,
            walker,
            backups,
        }
    }

    pub fn config(&self) -> &CloakConfig {
        &self.config
    }

    /// Validate the license. Called once at the head of every operation;
    /// an error here means no file has been touched.
    pub fn license_info(&self) -> Result<LicenseInfo> {
        self.license.validate()
    }

    fn level_or_default(&self, level: Option<ObfuscationLevel>) -> ObfuscationLevel {
        level.unwrap_or(self.config.default_level)
    }

    /// Obfuscate a single file into a self-executing stub.
    pub async fn obfuscate_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        level: Option<ObfuscationLevel>,
        options: &PassOptions,
    ) -> Result<PathBuf> {
        let info = self.license_info()?;
        if input.exists() {
            let size = fs::metadata(input).await?.len();
            self.license.check_usage(&info, 1, size)?;
        }
        self.obfuscator
            .obfuscate_file(input, output, self.level_or_default(level), options)
            .await
    }

    /// Deobfuscate a single stub or payload file back to source text.
    pub async fn deobfuscate_file(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
        self.license_info()?;
        self.obfuscator.deobfuscate_file(input, output).await
    }

    /// Analyze one file without writing anything.
    pub async fn analyze_file(&self, input: &Path) -> Result<AnalysisResult> {
        self.license_info()?;
        if !input.exists() {
            return Err(SourceCloakError::InputNotFound(input.to_path_buf()));
        }
        let content = fs::read_to_string(input).await?;
        Ok(analyzer::analyze(&content))
    }

    /// Obfuscate every candidate file under `dir`, writing suffixed siblings.
    ///
    /// One `BatchResult` per candidate; a failure on one file never aborts
    /// the rest.
    pub async fn obfuscate_directory(
        &self,
        dir: &Path,
        level: Option<ObfuscationLevel>,
        options: &PassOptions,
    ) -> Result<Vec<BatchResult>> {
        let info = self.license_info()?;
        let candidates = self.walker.discover(dir)?;
        self.license.check_usage(&info, candidates.len(), 0)?;
        let level = self.level_or_default(level);
        info!(dir = %dir.display(), count = candidates.len(), %level, "batch obfuscation started");

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let result = match self
                .obfuscator
                .obfuscate_file(&candidate, None, level, options)
                .await
            {
                Ok(output) => BatchResult::success(candidate, Some(output), "obfuscated"),
                Err(e) => BatchResult::error(candidate, e.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Deobfuscate every candidate under `dir`.
    ///
    /// With `output_dir`, outputs keep their file names under it; otherwise
    /// each output is a `_deobfuscated` sibling.
    pub async fn deobfuscate_directory(
        &self,
        dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<BatchResult>> {
        let info = self.license_info()?;
        let candidates = self.walker.discover(dir)?;
        self.license.check_usage(&info, candidates.len(), 0)?;

        if let Some(output_dir) = output_dir {
            fs::create_dir_all(output_dir).await?;
        }

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let output = output_dir.map(|out| {
                candidate
                    .file_name()
                    .map(|name| out.join(name))
                    .unwrap_or_else(|| out.join("deobfuscated.php"))
            });
            let result = match self
                .obfuscator
                .deobfuscate_file(&candidate, output.as_deref())
                .await
            {
                Ok(written) => BatchResult::success(candidate, Some(written), "deobfuscated"),
                Err(e) => BatchResult::error(candidate, e.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Analysis-only batch: one row per candidate, no output written.
    pub async fn analyze_directory(&self, dir: &Path) -> Result<Vec<BatchResult>> {
        self.license_info()?;
        let candidates = self.walker.discover(dir)?;

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let result = match fs::read_to_string(&candidate).await {
                Ok(content) => {
                    let analysis = analyzer::analyze(&content);
                    let verdict = if analysis.is_obfuscated {
                        "obfuscated"
                    } else {
                        "not obfuscated"
                    };
                    BatchResult::success(
                        candidate,
                        None,
                        format!("{verdict} ({}% confidence)", analysis.confidence),
                    )
                }
                Err(e) => BatchResult::error(candidate, e.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Run the secure-deploy state machine (confirm, backup, replace,
    /// package). See [`deploy::secure_deploy`].
    pub async fn secure_deploy<F>(
        &self,
        source: &Path,
        output: Option<&Path>,
        level: Option<ObfuscationLevel>,
        options: &PassOptions,
        create_package: bool,
        confirm: &mut F,
    ) -> Result<DeployOutcome>
    where
        F: FnMut(&str) -> bool,
    {
        let info = self.license_info()?;
        if source.is_dir() {
            let candidates = self.walker.discover(source)?;
            self.license.check_usage(&info, candidates.len(), 0)?;
        }
        deploy::secure_deploy(
            &self.obfuscator,
            &self.backups,
            &self.walker,
            source,
            output,
            self.level_or_default(level),
            options,
            create_package,
            confirm,
        )
        .await
    }

    /// Copy `path` into the backup directory before a destructive operation.
    pub async fn create_backup(&self, path: &Path) -> Result<PathBuf> {
        self.license_info()?;
        self.backups.create_backup(path, None).await
    }

    /// Restore a backup by name. See [`BackupManager::restore`].
    pub async fn restore_backup(
        &self,
        backup_name: &str,
        target: Option<&Path>,
        search_root: &Path,
    ) -> Result<PathBuf> {
        self.license_info()?;
        self.backups.restore(backup_name, target, search_root).await
    }

    pub async fn list_backups(&self) -> Result<Vec<String>> {
        self.backups.list_backups().await
    }
}
