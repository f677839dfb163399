//! License validation and key generation.
//!
//! Plain string parsing and time arithmetic, not a security control. The
//! transformation core queries this once per invocation and fails closed:
//! no file is touched on an invalid, unknown or expired key.

use chrono::{DateTime, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SourceCloakError};

pub const FEATURE_BASIC: &str = "basic_obfuscation";
pub const FEATURE_DEOBFUSCATION: &str = "deobfuscation";
pub const FEATURE_ADVANCED: &str = "advanced_obfuscation";
pub const FEATURE_ENTERPRISE: &str = "enterprise_features";

/// Generated key format: `PLAN-<unix seconds>-<8 alphanumerics>`.
static GENERATED_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]+)-(\d{10})-[A-Za-z0-9]{8}$").unwrap()
});

/// License metadata returned on successful validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub customer: String,
    pub plan: String,
    /// `None` means the license never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub features: Vec<String>,
    /// Maximum files per batch; negative means unlimited.
    pub max_files: i64,
    /// Maximum file size in bytes; negative means unlimited.
    pub max_file_size: i64,
}

impl LicenseInfo {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Validates license keys and enforces usage limits.
#[derive(Debug, Clone)]
pub struct LicenseManager {
    key: String,
}

impl LicenseManager {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Validate the configured key. Errors are terminal for the invocation.
    pub fn validate(&self) -> Result<LicenseInfo> {
        if self.key.is_empty() {
            return Err(SourceCloakError::License(
                "no license key configured; set OBFUSCATOR_LICENSE_KEY".to_string(),
            ));
        }

        if let Some(caps) = GENERATED_KEY_REGEX.captures(&self.key) {
            let plan = caps[1].to_lowercase();
            let timestamp: i64 = caps[2]
                .parse()
                .map_err(|_| SourceCloakError::License("malformed key timestamp".to_string()))?;
            return validate_generated_key(&plan, timestamp);
        }

        demo_license(&self.key)
            .ok_or_else(|| SourceCloakError::License(format!("unknown license key: {}", self.key)))
    }

    /// Check batch size and file size against the license limits.
    pub fn check_usage(&self, info: &LicenseInfo, file_count: usize, file_size: u64) -> Result<()> {
        if info.max_files > 0 && file_count as i64 > info.max_files {
            return Err(SourceCloakError::License(format!(
                "file count limit exceeded: max {}, requested {}",
                info.max_files, file_count
            )));
        }
        if info.max_file_size > 0 && file_size as i64 > info.max_file_size {
            return Err(SourceCloakError::License(format!(
                "file size limit exceeded: max {} bytes, got {} bytes",
                info.max_file_size, file_size
            )));
        }
        Ok(())
    }
}

/// Generate a key for `plan` expiring in `days` days (0 for never).
pub fn generate_key(plan: &str, days: i64) -> Result<String> {
    let plan = plan.to_lowercase();
    if !matches!(plan.as_str(), "demo" | "trial" | "pro" | "custom") {
        return Err(SourceCloakError::License(format!(
            "invalid plan '{plan}', expected demo, trial, pro or custom"
        )));
    }

    let timestamp = if days > 0 {
        (Utc::now() + Duration::days(days)).timestamp()
    } else {
        0
    };

    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    Ok(format!("{}-{:010}-{}", plan.to_uppercase(), timestamp, random))
}

fn validate_generated_key(plan: &str, timestamp: i64) -> Result<LicenseInfo> {
    if timestamp > 0 && timestamp < Utc::now().timestamp() {
        return Err(SourceCloakError::License("license key expired".to_string()));
    }

    let expires_at = if timestamp > 0 {
        Utc.timestamp_opt(timestamp, 0).single()
    } else {
        None
    };

    let info = match plan {
        "demo" => LicenseInfo {
            customer: "Generated Demo User".to_string(),
            plan: "Demo".to_string(),
            expires_at,
            features: vec![FEATURE_BASIC.to_string(), FEATURE_DEOBFUSCATION.to_string()],
            max_files: 10,
            max_file_size: 1024 * 1024,
        },
        "trial" => LicenseInfo {
            customer: "Generated Trial User".to_string(),
            plan: "Trial".to_string(),
            expires_at,
            features: vec![
                FEATURE_BASIC.to_string(),
                FEATURE_DEOBFUSCATION.to_string(),
                FEATURE_ADVANCED.to_string(),
            ],
            max_files: 50,
            max_file_size: 5 * 1024 * 1024,
        },
        "pro" => LicenseInfo {
            customer: "Generated Pro User".to_string(),
            plan: "Professional".to_string(),
            expires_at,
            features: vec![
                FEATURE_BASIC.to_string(),
                FEATURE_DEOBFUSCATION.to_string(),
                FEATURE_ADVANCED.to_string(),
                FEATURE_ENTERPRISE.to_string(),
            ],
            max_files: -1,
            max_file_size: -1,
        },
        "custom" => LicenseInfo {
            customer: "Generated Custom User".to_string(),
            plan: "Custom".to_string(),
            expires_at,
            features: vec![FEATURE_BASIC.to_string(), FEATURE_DEOBFUSCATION.to_string()],
            max_files: 100,
            max_file_size: 10 * 1024 * 1024,
        },
        other => {
            return Err(SourceCloakError::License(format!(
                "unknown license plan: {other}"
            )))
        }
    };

    Ok(info)
}

fn demo_license(key: &str) -> Option<LicenseInfo> {
    let now = Utc::now();
    match key {
        "DEMO-1234-5678-9ABC" => Some(LicenseInfo {
            customer: "Demo User".to_string(),
            plan: "Demo".to_string(),
            expires_at: Some(now + Duration::days(30)),
            features: vec![FEATURE_BASIC.to_string(), FEATURE_DEOBFUSCATION.to_string()],
            max_files: 10,
            max_file_size: 1024 * 1024,
        }),
        "TRIAL-ABCD-EFGH-IJKL" => Some(LicenseInfo {
            customer: "Trial User".to_string(),
            plan: "Trial".to_string(),
            expires_at: Some(now + Duration::days(7)),
            features: vec![
                FEATURE_BASIC.to_string(),
                FEATURE_DEOBFUSCATION.to_string(),
                FEATURE_ADVANCED.to_string(),
            ],
            max_files: 50,
            max_file_size: 5 * 1024 * 1024,
        }),
        "PRO-1234-5678-9ABC" => Some(LicenseInfo {
            customer: "Pro User".to_string(),
            plan: "Professional".to_string(),
            expires_at: Some(now + Duration::days(365)),
            features: vec![
                FEATURE_BASIC.to_string(),
                FEATURE_DEOBFUSCATION.to_string(),
                FEATURE_ADVANCED.to_string(),
                FEATURE_ENTERPRISE.to_string(),
            ],
            max_files: -1,
            max_file_size: -1,
        }),
        _ => None,
    }
}
