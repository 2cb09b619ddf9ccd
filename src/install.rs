//! The installation sequence.
//!
//! Everything happens in one strict order; there is no state carried between
//! runs and no retry anywhere. If a required step fails, the run dies and the
//! operator starts over.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::bootloader;
use crate::config::InstallConfig;
use crate::disk::editor::{mount_partition, LabelEditor, PartitionEditor, UMOUNT};
use crate::disk::label::{Label, LabelDefinition, SizeSpec};
use crate::disk::{self, MIN_DISK_SIZE};
use crate::ftplist::FtpList;
use crate::preflight;
use crate::process::Cmd;
use crate::prompt::Prompt;
use crate::timezone::ZoneDb;
use crate::user;

pub(crate) const TAR: &str = "/bin/tar";
pub(crate) const DD: &str = "/bin/dd";

/// Run the whole installation.
pub fn run(config: &InstallConfig, prompt: &mut dyn Prompt, skip_preflight: bool) -> Result<()> {
    if !skip_preflight {
        preflight::check()?;
    }

    // Detach anything a previous attempt left mounted.
    Cmd::new(UMOUNT).arg("-af").allow_fail().run()?;

    let disk_name = choose_disk(prompt)?;

    info!("Setting up partitions");
    let partitions = PartitionEditor::new(&disk_name)?;
    let mut editor = LabelEditor::new(&disk_name)?;
    if editor.disk_size() < MIN_DISK_SIZE {
        println!("Disk too small!");
        bail!(
            "disk {} holds {} bytes but at least {} are required",
            disk_name,
            editor.disk_size(),
            MIN_DISK_SIZE
        );
    }

    partitions.clear_disk()?;

    let physmem: u64 = disk::sysctl("hw.physmem")?
        .trim()
        .parse()
        .context("failed to parse hw.physmem")?;
    let labels = editor.autolabel(&default_plan(physmem))?;

    info!("Mounting filesystems");
    mount_all(&labels, &config.target_root)?;

    info!("Extracting image");
    Cmd::new(TAR)
        .arg("-C")
        .arg_path(&config.target_root)
        .arg("-xhpzf")
        .arg_path(&config.image_archive)
        .error_msg("image extraction failed")
        .run_interactive()?;

    info!("Merging config files");
    merge_config_sets(&config.target_root)?;

    info!("Creating devices");
    Cmd::new("./MAKEDEV")
        .arg("all")
        .dir(&config.target_root.join("dev"))
        .error_msg("device node creation failed")
        .run()?;

    info!("Creating fstab");
    write_fstab(&labels, &config.target_root)?;

    info!("Getting ftplist information");
    let ftplist = FtpList::load(&config.ftplist_url).unwrap_or_else(|err| {
        warn!("mirror lookup failed, using the fallback list: {err:#}");
        FtpList::empty()
    });

    info!("Setting up timezones");
    let mut zones = ZoneDb::new(&config.zoneinfo_dir);
    zones.setup(prompt, &config.target_root, ftplist.tz())?;

    info!("Setting up user");
    user::setup(prompt, &config.target_root)?;

    info!("Finishing up");
    append_system_config(&config.target_root)?;
    seed_entropy(&config.target_root)?;

    info!("Writing bootloader");
    bootloader::install(&config.target_root, &disk_name)?;

    println!("Installation complete.");
    Ok(())
}

/// Ask the operator which disk to install on, until a known name is given.
fn choose_disk(prompt: &mut dyn Prompt) -> Result<String> {
    let disks = disk::list_disks()?;
    if disks.is_empty() {
        bail!("no suitable disks found");
    }

    let mut chosen = String::new();
    while !disks.contains(&chosen) {
        println!("{}", disks.join(", "));
        chosen = prompt.ask("> ")?;
    }
    Ok(chosen)
}

/// The stock partition plan: a root filesystem, swap sized up to physical
/// memory, and the rest for `/var`.
pub fn default_plan(physmem: u64) -> Vec<LabelDefinition> {
    let swap_upper = format!("{}M", physmem.div_ceil(1024 * 1024));
    vec![
        LabelDefinition::mounted("/", SizeSpec::range("1G", "*"), 0, &["rw"]),
        LabelDefinition::swap(SizeSpec::range("100M", &swap_upper), 10),
        LabelDefinition::mounted("/var", SizeSpec::range("500M", "*"), 90, &["rw", "nosuid", "nodev"]),
    ]
}

/// Mount every filesystem label under the target root, parents before
/// children.
fn mount_all(labels: &[Label], root: &Path) -> Result<()> {
    let mut to_mount: Vec<&Label> = labels.iter().filter(|l| l.is_filesystem()).collect();
    to_mount.sort_by_key(|label| label.mountpoint().len());

    for label in to_mount {
        if !label.rel_mountpoint().is_empty() {
            fs::create_dir_all(root.join(label.rel_mountpoint()))?;
        }
        mount_partition(label, root)?;
    }
    Ok(())
}

/// Unpack the configuration sets the image carries under `var/sysmerge`.
pub fn merge_config_sets(root: &Path) -> Result<()> {
    let sysmerge = root.join("var/sysmerge");
    if !sysmerge.is_dir() {
        return Ok(());
    }

    let mut archives: Vec<_> = fs::read_dir(&sysmerge)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with("etc.tgz"))
        })
        .collect();
    archives.sort();

    for archive in archives {
        Cmd::new(TAR)
            .arg("-C")
            .arg_path(root)
            .arg("-zxphf")
            .arg_path(&archive)
            .error_msg(format!("merging {} failed", archive.display()))
            .run()?;
    }
    Ok(())
}

/// Write the target's fstab from the realized labels.
pub fn write_fstab(labels: &[Label], root: &Path) -> Result<()> {
    let mut content = labels
        .iter()
        .map(Label::to_fstab)
        .collect::<Vec<_>>()
        .join("\n");
    content.push('\n');

    let path = root.join("etc/fstab");
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Append the static system configuration: the aperture sysctl and the
/// loopback host entries.
pub fn append_system_config(root: &Path) -> Result<()> {
    append(&root.join("etc/sysctl.conf"), "machdep.allowaperture=1\n")?;
    append(
        &root.join("etc/hosts"),
        "127.0.0.1\tlocalhost\n::1\t\tlocalhost\n",
    )?;
    Ok(())
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

/// Seed the target's entropy files from the raw entropy device.
fn seed_entropy(root: &Path) -> Result<()> {
    dd("/dev/random", &root.join("etc/random.seed"), 512, 1)?;
    dd("/dev/random", &root.join("var/db/host.random"), 65536, 1)?;
    Ok(())
}

fn dd(input: &str, output: &Path, block_size: u64, count: u64) -> Result<()> {
    Cmd::new(DD)
        .arg(format!("if={input}"))
        .arg(format!("of={}", output.display()))
        .arg(format!("bs={block_size}"))
        .arg(format!("count={count}"))
        .error_msg(format!("seeding {} failed", output.display()))
        .run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::label::MountTarget;

    #[test]
    fn default_plan_has_root_swap_and_var_in_order() {
        let plan = default_plan(4 * 1024 * 1024 * 1024);
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan[0].target(),
            &MountTarget::Path("/".to_string())
        );
        assert_eq!(plan[1].target(), &MountTarget::Swap);
        assert_eq!(
            plan[2].target(),
            &MountTarget::Path("/var".to_string())
        );
    }

    #[test]
    fn swap_upper_bound_rounds_memory_up_to_megabytes() {
        let plan = default_plan(4 * 1024 * 1024 * 1024 + 1);
        assert_eq!(plan[1].to_line(), "swap            100M-4097M      10%");
    }

    #[test]
    fn var_options_restrict_devices_and_setuid() {
        let plan = default_plan(1024 * 1024 * 1024);
        assert_eq!(plan[2].options(), ["rw", "nosuid", "nodev"]);
    }
}
