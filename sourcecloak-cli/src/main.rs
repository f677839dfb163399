mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Commands::Obfuscate {
            input,
            output,
            level,
            backup,
            report,
            passes,
        } => cli::obfuscate_command(config, input, output, level, backup, report, passes).await,
        Commands::Deobfuscate {
            input,
            output,
            output_dir,
            analyze,
        } => cli::deobfuscate_command(config, input, output, output_dir, analyze).await,
        Commands::Analyze { input } => cli::analyze_command(config, input).await,
        Commands::Restore {
            backup_name,
            target,
        } => cli::restore_command(config, backup_name, target).await,
        Commands::SecureDeploy {
            source,
            output,
            exclude,
            level,
            create_package,
            yes,
            passes,
        } => {
            cli::secure_deploy_command(
                config,
                source,
                output,
                exclude,
                level,
                create_package,
                yes,
                passes,
            )
            .await
        }
        Commands::License => cli::license_command(config).await,
        Commands::GenerateLicense { plan, days } => cli::generate_license_command(plan, days).await,
    }
}
