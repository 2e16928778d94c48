#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "smsward", about = "Forwards incoming SMS messages to a mailbox")]
struct Args {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send a test email through the configured relay, then exit
    #[arg(long)]
    test_smtp: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => find_config_file()?,
    };
    let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config from {}: {}",
            config_path.display(),
            e
        )
    })?;
    let smsward: smsward::controller::Smsward = ron::from_str(&config_content)?;

    if args.test_smtp {
        return smsward.test_smtp().await;
    }

    smsward.run().await
}

/// Find the configuration file using the following precedence:
/// 1. `SMSWARD_CONFIG` environment variable
/// 2. ./smsward.config.ron (current working directory)
/// 3. /etc/smsward/smsward.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("SMSWARD_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "SMSWARD_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = vec![
        PathBuf::from("./smsward.config.ron"),
        PathBuf::from("/etc/smsward/smsward.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - SMSWARD_CONFIG environment variable\n{paths_tried}"
    )
}
