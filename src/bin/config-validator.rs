//! # Indexed Cache Configuration Validator
//!
//! Command-line tool for loading and validating indexed cache configuration
//! across environments before an application starts using it.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indexed_cache::config::{ConfigLoader, IndexedCacheConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const KNOWN_ENVIRONMENTS: [&str; 3] = ["development", "test", "production"];

#[derive(Parser)]
#[command(name = "indexed-cache-config")]
#[command(about = "Validate indexed cache configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment preset to start from (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration file layered over the preset (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ignore INDEXED_CACHE__* environment variable overrides
    #[arg(long)]
    no_env: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print the resolved configuration
    Show,

    /// List the built-in environment presets
    Environments,

    /// Compare the presets of two environments
    Compare {
        #[arg(short, long, default_value = "development")]
        base: String,

        #[arg(short, long)]
        target: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Show) => show(&cli),
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::Compare { base, target }) => compare(&cli, base, target),
    };

    match result {
        Ok(()) => {
            info!("Configuration check completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration check failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<IndexedCacheConfig> {
    ConfigLoader::load_for_environment(cli.config.as_deref(), &cli.environment, !cli.no_env)
        .with_context(|| {
            format!(
                "failed to load configuration for environment '{}'",
                cli.environment
            )
        })
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating Indexed Cache Configuration");
    println!("Environment: {}", cli.environment);
    if let Some(path) = &cli.config {
        println!("Config File: {}", path.display());
    }
    println!();

    let config = load(cli)?;
    println!("✅ Configuration loaded and validated");
    config.log_configuration();
    print_config(cli, &config)?;
    Ok(())
}

fn show(cli: &Cli) -> anyhow::Result<()> {
    let config = load(cli)?;
    print_config(cli, &config)
}

fn list_environments(cli: &Cli) -> anyhow::Result<()> {
    println!("📋 Built-in Environments:");
    for environment in KNOWN_ENVIRONMENTS {
        let marker = if environment == cli.environment { "→" } else { " " };
        println!("  {marker} {environment}");
    }
    Ok(())
}

fn compare(cli: &Cli, base: &str, target: &str) -> anyhow::Result<()> {
    for environment in [base, target] {
        if !KNOWN_ENVIRONMENTS.contains(&environment) {
            bail!("unknown environment '{environment}'");
        }
    }
    let base_config = IndexedCacheConfig::for_environment(base);
    let target_config = IndexedCacheConfig::for_environment(target);

    if cli.format == "json" {
        let comparison = serde_json::json!({ base: base_config, target: target_config });
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    println!("🔍 Comparing {base} → {target}");
    let base_rows = rows(&base_config);
    let target_rows = rows(&target_config);
    let mut differences = 0;
    for ((field, before), (_, after)) in base_rows.iter().zip(&target_rows) {
        if before != after {
            differences += 1;
            println!("  {field:<24} {before:>12} → {after}");
        }
    }
    if differences == 0 {
        println!("  No differences");
    }
    Ok(())
}

fn rows(config: &IndexedCacheConfig) -> Vec<(&'static str, String)> {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "none".to_string());
    vec![
        ("statistics_enabled", config.statistics_enabled.to_string()),
        ("expiry", format!("{:?}", config.expiry)),
        ("ttl_millis", config.ttl_millis.to_string()),
        (
            "max_entries",
            optional(config.max_entries.map(|n| n.to_string())),
        ),
        (
            "reaper_interval_millis",
            optional(config.reaper_interval_millis.map(|n| n.to_string())),
        ),
        (
            "event_channel_capacity",
            config.event_channel_capacity.to_string(),
        ),
    ]
}

fn print_config(cli: &Cli, config: &IndexedCacheConfig) -> anyhow::Result<()> {
    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "table" => {
            for (field, value) in rows(config) {
                println!("  {field:<24} {value}");
            }
        }
        other => bail!("unsupported output format '{other}' (expected table or json)"),
    }
    Ok(())
}
