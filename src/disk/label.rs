//! Allocation requests and realized partition labels.
//!
//! A [`LabelDefinition`] asks for space; disklabel(8) does the allocation; a
//! [`Label`] records what the disk ended up with and knows how to describe
//! itself as an fstab line.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use super::DiskInfo;

/// Disk metadata shared between the label editor and the labels it produces.
///
/// Formatting rewrites the on-disk label, so fstab generation must observe
/// the refreshed metadata rather than a copy taken before formatting.
pub type SharedDiskInfo = Rc<RefCell<DiskInfo>>;

/// Wrap freshly loaded metadata for sharing.
pub fn share(info: DiskInfo) -> SharedDiskInfo {
    Rc::new(RefCell::new(info))
}

/// Where a partition is mounted.
///
/// Swap is its own variant rather than a reserved mountpoint string, so a
/// typo in a path can never silently become a swap partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    /// A filesystem mounted at an absolute path.
    Path(String),
    /// A swap partition.
    Swap,
}

impl MountTarget {
    /// The mountpoint field disklabel expects in an allocation template.
    pub fn template_field(&self) -> &str {
        match self {
            MountTarget::Path(path) => path,
            MountTarget::Swap => "swap",
        }
    }
}

/// Requested partition size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
    /// An exact size, e.g. `512M`.
    Fixed(String),
    /// A size range; `upper` may be `*` for "whatever space remains".
    Range { lower: String, upper: String },
}

impl SizeSpec {
    /// Convenience constructor for a range.
    pub fn range(lower: &str, upper: &str) -> Self {
        SizeSpec::Range {
            lower: lower.to_string(),
            upper: upper.to_string(),
        }
    }

    /// The size field disklabel expects in an allocation template.
    pub fn template_field(&self) -> String {
        match self {
            SizeSpec::Fixed(size) => size.clone(),
            SizeSpec::Range { lower, upper } => format!("{lower}-{upper}"),
        }
    }
}

/// A request for one partition, before allocation.
///
/// The order of definitions in a plan is significant: it decides which
/// partition letter each one receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDefinition {
    target: MountTarget,
    size: SizeSpec,
    /// Share of the remaining space, as a percentage weight. Zero omits the
    /// field and leaves the share to disklabel.
    percent: u32,
    options: Vec<String>,
}

impl LabelDefinition {
    /// Request a filesystem mounted at `path`.
    pub fn mounted(path: &str, size: SizeSpec, percent: u32, options: &[&str]) -> Self {
        Self {
            target: MountTarget::Path(path.to_string()),
            size,
            percent,
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    /// Request a swap partition.
    pub fn swap(size: SizeSpec, percent: u32) -> Self {
        Self {
            target: MountTarget::Swap,
            size,
            percent,
            options: Vec::new(),
        }
    }

    pub fn target(&self) -> &MountTarget {
        &self.target
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Render this definition as one line of a disklabel allocation template.
    pub fn to_line(&self) -> String {
        let size_field = self.size.template_field();
        let percent_field = if self.percent > 0 {
            format!("{}%", self.percent)
        } else {
            String::new()
        };
        format!(
            "{:<15} {:<15} {}",
            self.target.template_field(),
            size_field,
            percent_field
        )
        .trim_end()
        .to_string()
    }
}

/// A realized partition: mountpoint, device letter, filesystem, options.
#[derive(Debug, Clone)]
pub struct Label {
    mountpoint: String,
    disk_name: String,
    letter: char,
    filesystem: Option<String>,
    options: BTreeSet<String>,
    diskinfo: SharedDiskInfo,
}

impl Label {
    /// Create a label for a partition the external tool just allocated.
    ///
    /// Swap targets normalize to mountpoint `none` with filesystem `swap` and
    /// option `sw`. Path targets start with no filesystem (set by formatting)
    /// and default to `noatime`; anyone who really needs atime can add it back
    /// on the installed system.
    pub fn new(
        target: &MountTarget,
        diskinfo: SharedDiskInfo,
        disk_name: &str,
        letter: char,
        options: &[String],
    ) -> Self {
        let mut options: BTreeSet<String> = options.iter().cloned().collect();
        let (mountpoint, filesystem) = match target {
            MountTarget::Swap => {
                options.insert("sw".to_string());
                ("none".to_string(), Some("swap".to_string()))
            }
            MountTarget::Path(path) => {
                options.insert("noatime".to_string());
                (path.clone(), None)
            }
        };

        Self {
            mountpoint,
            disk_name: disk_name.to_string(),
            letter,
            filesystem,
            options,
            diskinfo,
        }
    }

    pub fn mountpoint(&self) -> &str {
        &self.mountpoint
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn filesystem(&self) -> Option<&str> {
        self.filesystem.as_deref()
    }

    /// Record the filesystem written to this partition.
    pub fn set_filesystem(&mut self, filesystem: &str) {
        self.filesystem = Some(filesystem.to_string());
    }

    /// Add a mount option.
    pub fn add_option(&mut self, option: &str) {
        self.options.insert(option.to_string());
    }

    /// True when this label mounts a filesystem path rather than swap.
    pub fn is_filesystem(&self) -> bool {
        self.mountpoint.starts_with('/')
    }

    fn is_swap(&self) -> bool {
        self.filesystem.as_deref() == Some("swap")
    }

    /// Mountpoint relative to the target root.
    pub fn rel_mountpoint(&self) -> &str {
        self.mountpoint.trim_start_matches('/')
    }

    /// Block device path, e.g. `/dev/sd0a`.
    pub fn block_path(&self) -> String {
        format!("/dev/{}{}", self.disk_name, self.letter)
    }

    /// Raw character device path, e.g. `/dev/rsd0a`.
    pub fn raw_path(&self) -> String {
        format!("/dev/r{}{}", self.disk_name, self.letter)
    }

    /// fsck pass number: the root filesystem first, everything else after.
    fn passno(&self) -> u32 {
        if self.mountpoint == "/" {
            1
        } else {
            2
        }
    }

    /// Render this label as an fstab line.
    ///
    /// Empty until a filesystem has been set. Swap entries carry no dump or
    /// pass fields.
    pub fn to_fstab(&self) -> String {
        let Some(filesystem) = self.filesystem.as_deref() else {
            return String::new();
        };

        let options: Vec<&str> = self.options.iter().map(String::as_str).collect();
        let mut line = format!(
            "{}.{} {} {} {}",
            self.diskinfo.borrow().duid,
            self.letter,
            self.mountpoint,
            filesystem,
            options.join(",")
        );
        if !self.is_swap() {
            line.push_str(&format!(" 1 {}", self.passno()));
        }

        line
    }
}
