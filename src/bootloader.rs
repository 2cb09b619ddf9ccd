//! Bootloader installation.

use anyhow::Result;
use std::path::Path;

use crate::process::Cmd;

pub(crate) const INSTALLBOOT: &str = "/usr/sbin/installboot";

/// Write the boot blocks for `disk_name`, taking the bootstrap files from the
/// freshly extracted target root.
pub fn install(root: &Path, disk_name: &str) -> Result<()> {
    Cmd::new(INSTALLBOOT)
        .arg("-r")
        .arg_path(root)
        .arg(disk_name)
        .error_msg("installing the bootloader failed")
        .run()?;
    Ok(())
}
