//! puffin - unattended OpenBSD installer.
//!
//! Clears a disk, lets disklabel allocate the stock partition plan, extracts
//! the system image, and walks the operator through timezone and account
//! setup. Run it from the install media, answer three prompts, reboot.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use puffin::config::InstallConfig;
use puffin::install;
use puffin::prompt::StdinPrompt;

#[derive(Parser)]
#[command(name = "puffin")]
#[command(about = "Unattended OpenBSD installer")]
struct Cli {
    /// Target root where the new system is assembled
    #[arg(long)]
    target: Option<PathBuf>,

    /// Path to the system image archive
    #[arg(long)]
    image: Option<PathBuf>,

    /// Skip the host tool checks
    #[arg(long)]
    skip_preflight: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "puffin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = InstallConfig::load();
    if let Some(target) = cli.target {
        config.target_root = target;
    }
    if let Some(image) = cli.image {
        config.image_archive = image;
    }

    if cli.show_config {
        config.print();
        return Ok(());
    }

    let mut prompt = StdinPrompt;
    install::run(&config, &mut prompt, cli.skip_preflight)
}
