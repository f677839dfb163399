use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sourcecloak_core::{
    BatchResult, BatchStatus, BatchSummary, CloakConfig, DeployState, ObfuscationLevel,
    PassOptions, SourceCloak,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "sourcecloak")]
#[command(about = "Reversible PHP source obfuscation, analysis and secure deployment", version)]
pub struct Cli {
    /// License key; overrides OBFUSCATOR_LICENSE_KEY
    #[arg(long, global = true)]
    pub license_key: Option<String>,

    /// Backup directory; overrides OBFUSCATOR_BACKUP_DIR
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Defaults layered with env, then CLI flags on top.
    pub fn load_config(&self) -> Result<CloakConfig> {
        let mut config = CloakConfig::from_env()?;
        if let Some(key) = &self.license_key {
            config.license_key = key.clone();
        }
        if let Some(dir) = &self.backup_dir {
            config.backup_dir = dir.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Obfuscate a file, or every matching file under a directory
    Obfuscate {
        input: PathBuf,
        /// Output path (single file only; default: suffixed sibling)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Obfuscation level: basic, advanced or enterprise
        #[arg(short, long, value_parser = parse_level)]
        level: Option<ObfuscationLevel>,
        /// Back up the original before writing output
        #[arg(long)]
        backup: bool,
        /// Write the per-file results as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
        #[command(flatten)]
        passes: PassFlags,
    },
    /// Deobfuscate a stub or payload file, or a whole directory
    Deobfuscate {
        input: PathBuf,
        /// Output path (single file only; default: _deobfuscated sibling)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output directory for batch deobfuscation
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Analyze obfuscation state instead of writing output
        #[arg(long)]
        analyze: bool,
    },
    /// Heuristically judge whether content is already obfuscated
    Analyze { input: PathBuf },
    /// Restore a file from the backup directory
    Restore {
        /// Backup file name (as listed in the backup directory)
        backup_name: String,
        /// Explicit restore target; default: search for the original by name
        #[arg(short, long)]
        target: Option<PathBuf>,
    },
    /// Back up originals, replace them in place with obfuscated stubs
    SecureDeploy {
        source: PathBuf,
        /// Output directory for the deployment package
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Additional exclude patterns (substring match)
        #[arg(short, long)]
        exclude: Vec<String>,
        #[arg(short, long, value_parser = parse_level)]
        level: Option<ObfuscationLevel>,
        /// Bundle the deployed tree into a tar archive
        #[arg(long)]
        create_package: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        #[command(flatten)]
        passes: PassFlags,
    },
    /// Show license status and metadata
    License,
    /// Generate a license key
    GenerateLicense {
        /// Plan: demo, trial, pro or custom
        plan: String,
        /// Days until expiration (0 for never)
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

/// Per-pass overrides; unset flags leave the level defaults in place.
#[derive(Args)]
pub struct PassFlags {
    #[arg(long, value_name = "BOOL")]
    pub randomize_variables: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub encrypt_strings: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub control_flow_obfuscation: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub dead_code_injection: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub anti_debugging: Option<bool>,
}

impl PassFlags {
    fn to_options(&self) -> PassOptions {
        PassOptions {
            randomize_variables: self.randomize_variables,
            encrypt_strings: self.encrypt_strings,
            control_flow_obfuscation: self.control_flow_obfuscation,
            dead_code_injection: self.dead_code_injection,
            anti_debugging: self.anti_debugging,
        }
    }
}

fn parse_level(s: &str) -> Result<ObfuscationLevel, String> {
    s.parse()
}

pub async fn obfuscate_command(
    config: CloakConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    level: Option<ObfuscationLevel>,
    backup: bool,
    report: Option<PathBuf>,
    passes: PassFlags,
) -> Result<()> {
    let cloak = SourceCloak::new(config);
    let options = passes.to_options();

    if input.is_dir() {
        let results = cloak.obfuscate_directory(&input, level, &options).await?;
        if let Some(report_path) = report {
            write_report(&report_path, &results).await?;
        }
        finish_batch("Obfuscation Results", &results)
    } else {
        if backup {
            let backup_path = cloak.create_backup(&input).await?;
            println!("Backup created: {}", backup_path.display());
        }
        let written = cloak
            .obfuscate_file(&input, output.as_deref(), level, &options)
            .await?;
        println!("Obfuscated: {} -> {}", input.display(), written.display());
        Ok(())
    }
}

pub async fn deobfuscate_command(
    config: CloakConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    analyze: bool,
) -> Result<()> {
    let cloak = SourceCloak::new(config);

    if analyze {
        return analyze_command_inner(&cloak, input).await;
    }

    if input.is_dir() {
        let results = cloak
            .deobfuscate_directory(&input, output_dir.as_deref())
            .await?;
        finish_batch("Deobfuscation Results", &results)
    } else {
        let written = cloak.deobfuscate_file(&input, output.as_deref()).await?;
        println!(
            "Deobfuscated: {} -> {}",
            input.display(),
            written.display()
        );
        Ok(())
    }
}

pub async fn analyze_command(config: CloakConfig, input: PathBuf) -> Result<()> {
    let cloak = SourceCloak::new(config);
    analyze_command_inner(&cloak, input).await
}

async fn analyze_command_inner(cloak: &SourceCloak, input: PathBuf) -> Result<()> {
    if input.is_dir() {
        let results = cloak.analyze_directory(&input).await?;
        finish_batch("Analysis Results", &results)
    } else {
        let analysis = cloak.analyze_file(&input).await?;
        println!("Analysis: {}", input.display());
        println!("==========");
        println!(
            "Obfuscated: {}",
            if analysis.is_obfuscated { "yes" } else { "no" }
        );
        println!("Confidence: {}%", analysis.confidence);
        println!("Signals:    {}", analysis.signals.join(", "));
        Ok(())
    }
}

pub async fn restore_command(
    config: CloakConfig,
    backup_name: String,
    target: Option<PathBuf>,
) -> Result<()> {
    let cloak = SourceCloak::new(config);
    let search_root = std::env::current_dir().context("cannot determine working directory")?;

    match cloak
        .restore_backup(&backup_name, target.as_deref(), &search_root)
        .await
    {
        Ok(restored) => {
            println!("Restored to: {}", restored.display());
            Ok(())
        }
        Err(e) => {
            let available = cloak.list_backups().await.unwrap_or_default();
            if available.is_empty() {
                eprintln!("No backup files found in backup directory.");
            } else {
                eprintln!("Available backup files:");
                for name in available {
                    eprintln!("  - {name}");
                }
            }
            Err(e.into())
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn secure_deploy_command(
    mut config: CloakConfig,
    source: PathBuf,
    output: Option<PathBuf>,
    exclude: Vec<String>,
    level: Option<ObfuscationLevel>,
    create_package: bool,
    yes: bool,
    passes: PassFlags,
) -> Result<()> {
    config.exclude_patterns.extend(exclude);
    let cloak = SourceCloak::new(config);
    let options = passes.to_options();

    let mut confirm = |prompt: &str| {
        if yes {
            return true;
        }
        println!("{prompt}");
        print!("Proceed? (y/n): ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("y")
    };

    let outcome = cloak
        .secure_deploy(
            &source,
            output.as_deref(),
            level,
            &options,
            create_package,
            &mut confirm,
        )
        .await?;

    match outcome.state {
        DeployState::Aborted => {
            println!("Secure deployment cancelled.");
            return Ok(());
        }
        DeployState::Complete | DeployState::Partial => {}
    }

    if let Some(backup) = &outcome.backup_path {
        println!("Originals backed up to: {}", backup.display());
    }
    if let Some(package) = &outcome.package_path {
        println!("Deployment package: {}", package.display());
    }
    finish_batch("Secure Deployment Results", &outcome.results)
}

pub async fn license_command(config: CloakConfig) -> Result<()> {
    let cloak = SourceCloak::new(config);
    match cloak.license_info() {
        Ok(info) => {
            println!("License Status");
            println!("==============");
            println!("Customer: {}", info.customer);
            println!("Plan:     {}", info.plan);
            match info.expires_at {
                Some(expires) => {
                    let days_left = (expires - chrono::Utc::now()).num_days();
                    println!("Expires:  {} ({days_left} days left)", expires.format("%Y-%m-%d"));
                }
                None => println!("Expires:  never"),
            }
            println!("Features: {}", info.features.join(", "));
            Ok(())
        }
        Err(e) => {
            eprintln!("Invalid license: {e}");
            eprintln!("Generate a key with: sourcecloak generate-license <plan>");
            bail!("license validation failed");
        }
    }
}

pub async fn generate_license_command(plan: String, days: i64) -> Result<()> {
    let key = sourcecloak_core::license::generate_key(&plan, days)?;
    println!("Generated License Key");
    println!("=====================");
    println!("{key}");
    println!();
    println!("Export it before running other commands:");
    println!("  OBFUSCATOR_LICENSE_KEY={key}");
    Ok(())
}

/// Print the per-file table and summary; non-zero exit when any row failed.
fn finish_batch(title: &str, results: &[BatchResult]) -> Result<()> {
    print_results_table(title, results);
    let summary = BatchSummary::of(results);
    println!(
        "{} processed, {} succeeded, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    info!(
        total = summary.total,
        failed = summary.failed,
        "batch finished"
    );
    if !summary.all_succeeded() {
        bail!("{} of {} files failed", summary.failed, summary.total);
    }
    Ok(())
}

fn print_results_table(title: &str, results: &[BatchResult]) {
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    if results.is_empty() {
        println!("No matching files found.");
        return;
    }
    for result in results {
        let marker = match result.status {
            BatchStatus::Success => "ok   ",
            BatchStatus::Error => "error",
        };
        let output = result
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{marker}] {} -> {} ({})",
            result.input.display(),
            output,
            result.message
        );
    }
}

async fn write_report(path: &PathBuf, results: &[BatchResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    println!("Report saved to {}", path.display());
    Ok(())
}
