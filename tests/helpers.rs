//! Shared test utilities for puffin tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test environment with a temporary target root and zoneinfo hierarchy.
pub struct TestEnv {
    /// Temporary directory (kept alive for the lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Mock target root (where the new system would be assembled)
    pub root: PathBuf,
    /// Mock zoneinfo hierarchy
    pub zoneinfo: PathBuf,
}

pub const MOCK_ZONES: [&str; 4] = [
    "America/New_York",
    "Europe/Oslo",
    "Europe/Stockholm",
    "UTC",
];

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let root = base.join("root");
        let zoneinfo = base.join("zoneinfo");

        for dir in ["etc", "var/db", "var/sysmerge"] {
            fs::create_dir_all(root.join(dir)).expect("Failed to create target root dir");
        }

        for zone in MOCK_ZONES {
            let path = zoneinfo.join(zone);
            fs::create_dir_all(path.parent().expect("zones have parents"))
                .expect("Failed to create zoneinfo dir");
            fs::write(&path, b"TZif").expect("Failed to create zone file");
        }

        Self {
            _temp_dir: temp_dir,
            root,
            zoneinfo,
        }
    }
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &Path) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );

    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        target,
        expected_target,
        "Symlink {} points to {:?}, expected {}",
        path.display(),
        target,
        expected_target.display()
    );
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read file: {}", path.display()));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}
