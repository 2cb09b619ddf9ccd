//! Disk inventory and metadata.
//!
//! Disk discovery reads the kernel's `hw.disknames` inventory; metadata comes
//! from parsing the textual output of disklabel(8). Both parsers are plain
//! functions over captured text so they can be exercised without the tools.

pub mod editor;
pub mod label;

use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

use crate::process::Cmd;

pub(crate) const DISKLABEL: &str = "/sbin/disklabel";

/// Device classes we install on: SCSI, virtual, and IDE/SATA disks.
pub const DISK_PREFIXES: [&str; 3] = ["sd", "vn", "wd"];

/// Refuse to install on a disk smaller than 2 GiB.
pub const MIN_DISK_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Query a single sysctl value.
pub fn sysctl(name: &str) -> Result<String> {
    let result = Cmd::new("sysctl").args(["-n", name]).run()?;
    Ok(result.stdout)
}

/// List the disk devices suitable for installation, in inventory order.
pub fn list_disks() -> Result<Vec<String>> {
    let raw = sysctl("hw.disknames")?;
    Ok(parse_disknames(&raw))
}

/// Extract installable device names from a raw `hw.disknames` string.
///
/// The inventory is comma-separated `name:duid` entries. Only names whose
/// two-character class prefix is in [`DISK_PREFIXES`] are kept.
pub fn parse_disknames(raw: &str) -> Vec<String> {
    raw.trim()
        .split(',')
        .filter_map(|entry| entry.split(':').next())
        .filter(|name| {
            name.get(0..2)
                .map_or(false, |prefix| DISK_PREFIXES.contains(&prefix))
        })
        .map(|name| name.to_string())
        .collect()
}

/// Run disklabel(8) against a disk and capture its output.
pub(crate) fn disklabel(disk_name: &str, options: &[&str]) -> Result<String> {
    let result = Cmd::new(DISKLABEL)
        .args(options.iter().copied())
        .arg(disk_name)
        .run()?;
    Ok(result.stdout)
}

/// A required field was absent or unusable in disklabel output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("disklabel output is missing the '{0}' field")]
    MissingField(&'static str),
    #[error("disklabel field '{field}' has unusable value '{value}'")]
    InvalidField { field: &'static str, value: String },
}

/// Metadata for one disk, parsed from disklabel(8) output.
///
/// The fields are extracted and validated once at parse time; formatting and
/// labeling change the on-disk metadata, so [`DiskInfo::refresh`] re-reads it
/// after those steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    /// Device name, e.g. `sd0`.
    pub device: String,
    /// Volume label.
    pub label: String,
    /// Disklabel unique identifier, stable across reboots.
    pub duid: String,
    /// Total sector count.
    pub sectors: u64,
    /// Bytes per sector.
    pub bytes_per_sector: u64,
}

impl DiskInfo {
    /// Read and parse the disklabel of `disk_name`.
    pub fn load(disk_name: &str) -> Result<Self> {
        let output = disklabel(disk_name, &[])?;
        Ok(Self::parse(disk_name, &output)?)
    }

    /// Parse disklabel output into a validated record.
    ///
    /// Every `key: value` line is collected first (a later duplicate key wins),
    /// then the fields we depend on are pulled out and checked.
    pub fn parse(device: &str, output: &str) -> Result<Self, MetadataError> {
        let line = Regex::new(r"(?m)^([\S ]+): ([^\r\n]+)$").expect("static regex");
        let mut data: HashMap<&str, &str> = HashMap::new();
        for capture in line.captures_iter(output) {
            data.insert(
                capture.get(1).expect("group 1").as_str(),
                capture.get(2).expect("group 2").as_str(),
            );
        }

        let field = |name: &'static str| -> Result<&str, MetadataError> {
            data.get(name).copied().ok_or(MetadataError::MissingField(name))
        };
        let numeric = |name: &'static str| -> Result<u64, MetadataError> {
            let value = field(name)?;
            value.trim().parse().map_err(|_| MetadataError::InvalidField {
                field: name,
                value: value.to_string(),
            })
        };

        Ok(Self {
            device: device.to_string(),
            label: field("label")?.to_string(),
            duid: field("duid")?.to_string(),
            sectors: numeric("total sectors")?,
            bytes_per_sector: numeric("bytes/sector")?,
        })
    }

    /// Total disk size in bytes.
    pub fn size(&self) -> u64 {
        self.sectors * self.bytes_per_sector
    }

    /// Re-read the disklabel and replace this record in place.
    pub fn refresh(&mut self) -> Result<()> {
        *self = Self::load(&self.device)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# /dev/rsd0c:
type: SCSI
disk: SCSI disk
label: mydisk
duid: 8d293bf76308f751
flags:
bytes/sector: 512
sectors/track: 63
total sectors: 8388608
boundstart: 64
boundend: 8388608
";

    #[test]
    fn parses_disknames_in_order() {
        let names = parse_disknames("sd0:8d293bf76308f751,cd0:,wd1:aabbccdd00112233,vn0:\n");
        assert_eq!(names, vec!["sd0", "wd1", "vn0"]);
    }

    #[test]
    fn rejects_short_and_foreign_prefixes() {
        let names = parse_disknames("fd0:,x:,rd0:");
        assert!(names.is_empty());
    }

    #[test]
    fn parses_metadata_fields() {
        let info = DiskInfo::parse("sd0", SAMPLE).unwrap();
        assert_eq!(info.device, "sd0");
        assert_eq!(info.label, "mydisk");
        assert_eq!(info.duid, "8d293bf76308f751");
        assert_eq!(info.sectors, 8388608);
        assert_eq!(info.bytes_per_sector, 512);
    }

    #[test]
    fn size_is_sectors_times_sector_size() {
        let info = DiskInfo::parse("sd0", SAMPLE).unwrap();
        assert_eq!(info.size(), 8388608 * 512);
    }

    #[test]
    fn missing_field_is_a_typed_error() {
        let err = DiskInfo::parse("sd0", "label: x\nduid: y\nbytes/sector: 512\n").unwrap_err();
        assert_eq!(err, MetadataError::MissingField("total sectors"));
    }

    #[test]
    fn malformed_number_is_a_typed_error() {
        let output = SAMPLE.replace("total sectors: 8388608", "total sectors: lots");
        let err = DiskInfo::parse("sd0", &output).unwrap_err();
        assert_eq!(
            err,
            MetadataError::InvalidField {
                field: "total sectors",
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn later_duplicate_keys_overwrite() {
        let output = format!("{SAMPLE}duid: ffffffffffffffff\n");
        let info = DiskInfo::parse("sd0", &output).unwrap();
        assert_eq!(info.duid, "ffffffffffffffff");
    }
}
