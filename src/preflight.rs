//! Host tool checks.
//!
//! Everything the installer needs is invoked by absolute path from the
//! install media. Checking them up front means a missing tool is reported
//! before the disk is touched, not halfway through a partitioned install.

use anyhow::{bail, Result};
use std::path::Path;

use crate::disk::editor::{FDISK, MOUNT, NEWFS, UMOUNT};
use crate::disk::DISKLABEL;
use crate::install::{DD, TAR};
use crate::user::{CHROOT, PASSWD, PWD_MKDB, USERADD};

/// Tools the installation cannot proceed without.
///
/// `sysctl` and `curl` resolve through PATH and are not listed; curl is
/// optional anyway since the mirror lookup fails closed.
pub fn required_tools() -> [&'static str; 12] {
    [
        FDISK,
        DISKLABEL,
        NEWFS,
        MOUNT,
        UMOUNT,
        TAR,
        DD,
        PWD_MKDB,
        USERADD,
        CHROOT,
        PASSWD,
        crate::bootloader::INSTALLBOOT,
    ]
}

/// Verify every required tool exists, reporting all misses at once.
pub fn check() -> Result<()> {
    let missing: Vec<&str> = required_tools()
        .into_iter()
        .filter(|tool| !Path::new(tool).exists())
        .collect();

    if !missing.is_empty() {
        bail!(
            "required tools are missing from the install media:\n  {}",
            missing.join("\n  ")
        );
    }
    Ok(())
}
