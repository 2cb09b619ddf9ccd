//! Driving fdisk(8) and disklabel(8) to realize a partition plan.

use anyhow::{ensure, Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::label::{share, Label, LabelDefinition, SharedDiskInfo};
use super::{disklabel, DiskInfo};
use crate::process::Cmd;

pub(crate) const FDISK: &str = "/sbin/fdisk";
pub(crate) const NEWFS: &str = "/sbin/newfs";
pub(crate) const MOUNT: &str = "/sbin/mount";
pub(crate) const UMOUNT: &str = "/sbin/umount";

/// Assignable partition letters, in allocation order.
///
/// `c` always spans the whole disk and is never handed out.
pub const PARTITION_LETTERS: [char; 7] = ['a', 'b', 'd', 'e', 'f', 'g', 'h'];

/// Clears and initializes the raw partition table.
pub struct PartitionEditor {
    disk_name: String,
}

/// The stock installer suggests at least 960 blocks for the boot partition;
/// pin double that.
const BOOT_BLOCKS: u32 = 1920;

impl PartitionEditor {
    pub fn new(disk_name: &str) -> Result<Self> {
        ensure!(!disk_name.is_empty(), "disk name must not be empty");
        Ok(Self {
            disk_name: disk_name.to_string(),
        })
    }

    /// Write a fresh MBR and partition table covering the whole disk.
    pub fn clear_disk(&self) -> Result<()> {
        Cmd::new(FDISK)
            .args(["-y", "-b", &BOOT_BLOCKS.to_string(), "-ig"])
            .arg(&self.disk_name)
            .error_msg("clearing the partition table failed")
            .run()?;
        Ok(())
    }
}

/// Realizes a list of [`LabelDefinition`]s into formatted partitions.
pub struct LabelEditor {
    disk_name: String,
    diskinfo: SharedDiskInfo,
}

impl LabelEditor {
    /// Create an editor for `disk_name` and load its current metadata.
    pub fn new(disk_name: &str) -> Result<Self> {
        ensure!(!disk_name.is_empty(), "disk name must not be empty");
        let diskinfo = share(DiskInfo::load(disk_name)?);
        Ok(Self {
            disk_name: disk_name.to_string(),
            diskinfo,
        })
    }

    /// Total size of the disk in bytes.
    pub fn disk_size(&self) -> u64 {
        self.diskinfo.borrow().size()
    }

    /// Metadata handle shared with the labels this editor produces.
    pub fn diskinfo(&self) -> SharedDiskInfo {
        SharedDiskInfo::clone(&self.diskinfo)
    }

    /// Allocate and format the partitions described by `plan`.
    ///
    /// The plan is serialized to a template file and handed to disklabel,
    /// which owns all of the space-distribution math. Partition letters are
    /// assigned in plan order, every path-mounted partition is formatted, and
    /// the disk metadata is re-read before returning since labeling rewrites
    /// it.
    pub fn autolabel(&mut self, plan: &[LabelDefinition]) -> Result<Vec<Label>> {
        ensure!(
            plan.len() <= PARTITION_LETTERS.len(),
            "plan asks for {} partitions but only {} letters are assignable",
            plan.len(),
            PARTITION_LETTERS.len()
        );

        let mut template_file =
            NamedTempFile::new().context("failed to create the label template file")?;
        template_file
            .write_all(render_template(plan).as_bytes())
            .context("failed to write the label template")?;
        template_file
            .flush()
            .context("failed to flush the label template")?;

        let template_path = template_file.path().to_string_lossy();
        disklabel(&self.disk_name, &["-A", "-w", "-T", &template_path])?;

        let mut labels = realize(plan, &self.diskinfo, &self.disk_name);
        for label in &mut labels {
            if label.is_filesystem() {
                format_partition(label)?;
            }
        }

        self.diskinfo.borrow_mut().refresh()?;
        Ok(labels)
    }
}

/// Serialize a plan into the template text disklabel consumes.
pub fn render_template(plan: &[LabelDefinition]) -> String {
    plan.iter()
        .map(LabelDefinition::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn a committed plan into labels, assigning partition letters in order.
pub fn realize(
    plan: &[LabelDefinition],
    diskinfo: &SharedDiskInfo,
    disk_name: &str,
) -> Vec<Label> {
    plan.iter()
        .zip(PARTITION_LETTERS)
        .map(|(definition, letter)| {
            Label::new(
                definition.target(),
                SharedDiskInfo::clone(diskinfo),
                disk_name,
                letter,
                definition.options(),
            )
        })
        .collect()
}

/// Make a filesystem on the label's partition and record it.
///
/// A mount left over from an earlier attempt would make newfs fail, so it is
/// unmounted first; that unmount failing just means nothing was mounted.
pub fn format_partition(label: &mut Label) -> Result<()> {
    Cmd::new(UMOUNT)
        .arg(label.block_path())
        .allow_fail()
        .run()?;
    Cmd::new(NEWFS)
        .arg(label.raw_path())
        .error_msg(format!("formatting {} failed", label.raw_path()))
        .run()?;
    label.set_filesystem("ffs");
    Ok(())
}

/// Mount a label's filesystem under the target root.
///
/// softdep speeds up the install considerably and is no riskier than the
/// async mounts the stock installer uses.
pub fn mount_partition(label: &Label, root: &Path) -> Result<()> {
    Cmd::new(MOUNT)
        .args(["-o", "softdep"])
        .arg(label.block_path())
        .arg_path(&root.join(label.rel_mountpoint()))
        .error_msg(format!("mounting {} failed", label.block_path()))
        .run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::label::SizeSpec;

    fn diskinfo() -> SharedDiskInfo {
        share(DiskInfo {
            device: "sd0".to_string(),
            label: "mydisk".to_string(),
            duid: "8d293bf76308f751".to_string(),
            sectors: 8388608,
            bytes_per_sector: 512,
        })
    }

    fn three_part_plan() -> Vec<LabelDefinition> {
        vec![
            LabelDefinition::mounted("/", SizeSpec::range("1G", "*"), 0, &[]),
            LabelDefinition::swap(SizeSpec::range("100M", "4096M"), 10),
            LabelDefinition::mounted("/var", SizeSpec::range("500M", "*"), 90, &["nosuid", "nodev"]),
        ]
    }

    #[test]
    fn template_joins_plan_lines() {
        let template = render_template(&three_part_plan());
        let lines: Vec<&str> = template.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('/'));
        assert!(lines[1].starts_with("swap"));
        assert!(lines[2].starts_with("/var"));
    }

    #[test]
    fn letters_follow_plan_order_and_skip_c() {
        let labels = realize(&three_part_plan(), &diskinfo(), "sd0");
        let letters: Vec<char> = labels.iter().map(Label::letter).collect();
        assert_eq!(letters, vec!['a', 'b', 'd']);
    }

    #[test]
    fn realized_mountpoints_are_normalized() {
        let labels = realize(&three_part_plan(), &diskinfo(), "sd0");
        let mountpoints: Vec<&str> = labels.iter().map(Label::mountpoint).collect();
        assert_eq!(mountpoints, vec!["/", "none", "/var"]);
    }

    #[test]
    fn only_path_labels_want_formatting() {
        let labels = realize(&three_part_plan(), &diskinfo(), "sd0");
        let formatted: Vec<bool> = labels.iter().map(Label::is_filesystem).collect();
        assert_eq!(formatted, vec![true, false, true]);
        assert_eq!(labels[1].filesystem(), Some("swap"));
    }

    #[test]
    fn no_letter_is_reused_for_a_full_plan() {
        let plan: Vec<LabelDefinition> = (0..PARTITION_LETTERS.len())
            .map(|i| LabelDefinition::mounted(&format!("/p{i}"), SizeSpec::range("1M", "*"), 0, &[]))
            .collect();
        let labels = realize(&plan, &diskinfo(), "sd0");
        let letters: Vec<char> = labels.iter().map(Label::letter).collect();
        assert_eq!(letters, PARTITION_LETTERS.to_vec());
    }
}
