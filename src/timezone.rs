//! Timezone selection and application.

use anyhow::{ensure, Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::prompt::Prompt;

/// Default zoneinfo hierarchy on the install media.
pub const DEFAULT_ZONEINFO_DIR: &str = "/usr/share/zoneinfo";

/// The zoneinfo hierarchy, with a lazily-built list of zone names.
///
/// The list is only walked once; the interactive flow searches it repeatedly
/// while the operator hunts for the right name.
pub struct ZoneDb {
    dir: PathBuf,
    zones: Option<Vec<String>>,
}

impl ZoneDb {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            zones: None,
        }
    }

    /// All zone names (paths relative to the zoneinfo root), sorted.
    pub fn zones(&mut self) -> Result<&[String]> {
        if self.zones.is_none() {
            let mut found = Vec::new();
            for entry in WalkDir::new(&self.dir) {
                let entry = entry.with_context(|| {
                    format!("failed to walk zoneinfo at {}", self.dir.display())
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&self.dir)
                    .expect("walked entries live under the walk root");
                found.push(relative.to_string_lossy().into_owned());
            }
            found.sort();
            self.zones = Some(found);
        }
        Ok(self.zones.as_deref().expect("populated above"))
    }

    /// Zone names starting with `prefix`.
    pub fn search(&mut self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .zones()?
            .iter()
            .filter(|zone| zone.starts_with(prefix))
            .cloned()
            .collect())
    }

    /// True when `name` identifies a real zone file.
    pub fn is_valid(&self, name: &str) -> bool {
        !name.is_empty() && self.dir.join(name).is_file()
    }

    /// Point the target system's `etc/localtime` at the chosen zone.
    ///
    /// A leftover symlink from a previous attempt is removed first; it not
    /// existing is fine.
    pub fn apply(&self, root: &Path, tz: &str) -> Result<()> {
        ensure!(self.is_valid(tz), "'{tz}' is not a known timezone");

        let link = root.join("etc/localtime");
        match fs::remove_file(&link) {
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            other => other
                .with_context(|| format!("failed to remove stale {}", link.display()))?,
        }
        std::os::unix::fs::symlink(self.dir.join(tz), &link)
            .with_context(|| format!("failed to link {}", link.display()))?;
        Ok(())
    }

    /// Ask the operator which timezone to use.
    ///
    /// A valid suggestion only needs confirmation; any answer other than `n`
    /// accepts it. Otherwise we prompt until a valid name is entered, showing
    /// prefix matches after each miss.
    pub fn choose(&mut self, prompt: &mut dyn Prompt, suggested: &str) -> Result<String> {
        if self.is_valid(suggested) {
            println!("Detected the following timezone: {suggested}");
            if prompt.ask("Is this correct? (y/n) ")? != "n" {
                return Ok(suggested.to_string());
            }
        }

        loop {
            let tz = prompt.ask("Timezone: ")?;
            if self.is_valid(&tz) {
                return Ok(tz);
            }
            for candidate in self.search(&tz)? {
                println!("{candidate}");
            }
        }
    }

    /// Interactive selection followed by application to the target root.
    pub fn setup(&mut self, prompt: &mut dyn Prompt, root: &Path, suggested: &str) -> Result<()> {
        let tz = self.choose(prompt, suggested)?;
        self.apply(root, &tz)
    }
}
