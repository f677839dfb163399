//! Process configuration.
//!
//! Constructed once at startup and passed by reference into each component;
//! nothing reads the environment after this point.

use std::path::PathBuf;

use config as config_rs;

use crate::errors::{Result, SourceCloakError};
use crate::pipeline::ObfuscationLevel;

/// Paths excluded from batch discovery unless overridden. Matched as
/// substrings of the candidate path, not as globs.
pub const DEFAULT_EXCLUDES: [&str; 8] = [
    "vendor",
    "node_modules",
    "storage/logs",
    "storage/framework",
    ".git",
    ".env",
    "composer.lock",
    "package-lock.json",
];

const DEFAULT_BACKUP_DIR: &str = "obfuscator_backups";
const DEFAULT_OUTPUT_SUFFIX: &str = "_obfuscated";

#[derive(Debug, Clone)]
pub struct CloakConfig {
    /// Level used when an operation does not specify one.
    pub default_level: ObfuscationLevel,
    /// Extensions (without dot) included in batch discovery.
    pub include_extensions: Vec<String>,
    /// Substring patterns excluded from batch discovery.
    pub exclude_patterns: Vec<String>,
    /// Where backups and secure-deploy backup trees are written. Must not be
    /// web-servable.
    pub backup_dir: PathBuf,
    /// Suffix inserted before the extension of obfuscated outputs.
    pub output_suffix: String,
    /// Collapse whitespace runs during the basic pass.
    pub remove_whitespace: bool,
    /// License key; validated fail-closed before any operation.
    pub license_key: String,
}

impl Default for CloakConfig {
    fn default() -> Self {
        Self {
            default_level: ObfuscationLevel::Basic,
            include_extensions: vec!["php".to_string()],
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            remove_whitespace: true,
            license_key: String::new(),
        }
    }
}

impl CloakConfig {
    /// Build the configuration from defaults layered with `OBFUSCATOR_*`
    /// environment overrides. CLI flags take precedence over both; the CLI
    /// applies them on the returned struct.
    pub fn from_env() -> Result<Self> {
        let mut builder = config_rs::Config::builder()
            .set_default("level", ObfuscationLevel::Basic.as_str())
            .map_err(cfg_err)?
            .set_default("backup_dir", DEFAULT_BACKUP_DIR)
            .map_err(cfg_err)?
            .set_default("output_suffix", DEFAULT_OUTPUT_SUFFIX)
            .map_err(cfg_err)?
            .set_default("remove_whitespace", true)
            .map_err(cfg_err)?
            .set_default("exclude", DEFAULT_EXCLUDES.join(","))
            .map_err(cfg_err)?
            .set_default("license_key", "")
            .map_err(cfg_err)?;

        for (env_var, key) in [
            ("OBFUSCATOR_LEVEL", "level"),
            ("OBFUSCATOR_BACKUP_DIR", "backup_dir"),
            ("OBFUSCATOR_OUTPUT_SUFFIX", "output_suffix"),
            ("OBFUSCATOR_REMOVE_WHITESPACE", "remove_whitespace"),
            ("OBFUSCATOR_EXCLUDE", "exclude"),
            ("OBFUSCATOR_LICENSE_KEY", "license_key"),
        ] {
            if let Ok(value) = std::env::var(env_var) {
                builder = builder.set_override(key, value).map_err(cfg_err)?;
            }
        }

        let cfg = builder.build().map_err(cfg_err)?;

        let level: String = cfg.get("level").map_err(cfg_err)?;
        let exclude: String = cfg.get("exclude").map_err(cfg_err)?;

        Ok(Self {
            default_level: level.parse().map_err(SourceCloakError::Configuration)?,
            include_extensions: vec!["php".to_string()],
            exclude_patterns: exclude
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            backup_dir: PathBuf::from(cfg.get::<String>("backup_dir").map_err(cfg_err)?),
            output_suffix: cfg.get("output_suffix").map_err(cfg_err)?,
            remove_whitespace: cfg.get("remove_whitespace").map_err(cfg_err)?,
            license_key: cfg.get("license_key").map_err(cfg_err)?,
        })
    }
}

fn cfg_err(e: config_rs::ConfigError) -> SourceCloakError {
    SourceCloakError::Configuration(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_php() {
        let cfg = CloakConfig::default();
        assert_eq!(cfg.include_extensions, vec!["php"]);
        assert_eq!(cfg.default_level, ObfuscationLevel::Basic);
        assert!(cfg.exclude_patterns.iter().any(|p| p == "vendor"));
    }
}
