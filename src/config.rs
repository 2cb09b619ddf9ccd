//! Installer configuration.
//!
//! The few tunables come from the environment, with a `.env` file loaded at
//! startup for unattended runs. Environment variables always win over the
//! built-in defaults.

use std::env;
use std::path::PathBuf;

use crate::ftplist;
use crate::timezone::DEFAULT_ZONEINFO_DIR;

/// Where the new system is assembled.
pub const DEFAULT_TARGET_ROOT: &str = "/mnt";

/// System image extracted onto the new root.
pub const DEFAULT_IMAGE_ARCHIVE: &str = "image.tar.gz";

#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Target root the new system is assembled under.
    pub target_root: PathBuf,
    /// Path to the system image tarball.
    pub image_archive: PathBuf,
    /// Zoneinfo hierarchy used for timezone selection.
    pub zoneinfo_dir: PathBuf,
    /// Endpoint of the mirror/metadata listing.
    pub ftplist_url: String,
}

impl InstallConfig {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        Self {
            target_root: path_var("INSTALL_ROOT", DEFAULT_TARGET_ROOT),
            image_archive: path_var("INSTALL_IMAGE", DEFAULT_IMAGE_ARCHIVE),
            zoneinfo_dir: path_var("ZONEINFO_DIR", DEFAULT_ZONEINFO_DIR),
            ftplist_url: env::var("FTPLIST_URL")
                .unwrap_or_else(|_| ftplist::DEFAULT_URL.to_string()),
        }
    }

    /// Print the effective configuration.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  INSTALL_ROOT:  {}", self.target_root.display());
        println!("  INSTALL_IMAGE: {}", self.image_archive.display());
        println!("  ZONEINFO_DIR:  {}", self.zoneinfo_dir.display());
        println!("  FTPLIST_URL:   {}", self.ftplist_url);
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}
