//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated scratch root
//! - Files, directories and symlinks inside it
//! - Paths guaranteed not to exist
//!
//! # Usage
//!
//! ```ignore
//! use vposix_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new().unwrap();
//! let file = env.create_file("a.txt", b"hi").unwrap();
//! let gone = env.missing_path("deleted.txt").unwrap();
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tempfile::TempDir;

use crate::{Config, StrategyMode};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment rooted in a temporary directory
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Root of all paths created by this environment
    pub root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            root,
            test_id,
        })
    }

    pub fn path(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Create a test file with content
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.path(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a test directory
    pub fn create_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(relative_path);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create a symlink at `relative_path` pointing at `target` (verbatim).
    #[cfg(unix)]
    pub fn create_symlink(&self, target: &Path, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(relative_path);
        std::os::unix::fs::symlink(target, &path)?;
        Ok(path)
    }

    /// A path that existed and was deleted just now.
    pub fn missing_path(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.create_file(relative_path, b"")?;
        std::fs::remove_file(&path)?;
        Ok(path)
    }

    /// Default config forced onto one strategy.
    pub fn config(&self, mode: StrategyMode) -> Config {
        let mut config = Config::default();
        config.strategy.mode = mode;
        config
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
