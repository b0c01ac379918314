//! Backend strategy abstraction.
//!
//! Two implementations exist: [`Native`](crate::native::Native) reads and
//! writes kernel structures directly, [`Fallback`](crate::fallback::Fallback)
//! combines the standard library with external utilities. Both produce the
//! same result types.

use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::filestat::FileStat;
use crate::passwd::Passwd;

// ============================================================================
// Operations
// ============================================================================

/// Logical operations routed through a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Stat,
    Lstat,
    Chmod,
    Chown,
    Link,
    Symlink,
    Readlink,
    Mkdir,
    Utime,
    Getpwnam,
    Getpwuid,
    Getpwent,
    Getuid,
    Geteuid,
    Getgid,
    Getegid,
    Getlogin,
}

impl Op {
    pub const COUNT: usize = 17;

    pub const ALL: [Op; Op::COUNT] = [
        Op::Stat,
        Op::Lstat,
        Op::Chmod,
        Op::Chown,
        Op::Link,
        Op::Symlink,
        Op::Readlink,
        Op::Mkdir,
        Op::Utime,
        Op::Getpwnam,
        Op::Getpwuid,
        Op::Getpwent,
        Op::Getuid,
        Op::Geteuid,
        Op::Getgid,
        Op::Getegid,
        Op::Getlogin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Op::Stat => "stat",
            Op::Lstat => "lstat",
            Op::Chmod => "chmod",
            Op::Chown => "chown",
            Op::Link => "link",
            Op::Symlink => "symlink",
            Op::Readlink => "readlink",
            Op::Mkdir => "mkdir",
            Op::Utime => "utime",
            Op::Getpwnam => "getpwnam",
            Op::Getpwuid => "getpwuid",
            Op::Getpwent => "getpwent",
            Op::Getuid => "getuid",
            Op::Geteuid => "geteuid",
            Op::Getgid => "getgid",
            Op::Getegid => "getegid",
            Op::Getlogin => "getlogin",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which numeric identity to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    RealUid,
    EffectiveUid,
    RealGid,
    EffectiveGid,
}

impl IdKind {
    pub(crate) fn op(self) -> Op {
        match self {
            IdKind::RealUid => Op::Getuid,
            IdKind::EffectiveUid => Op::Geteuid,
            IdKind::RealGid => Op::Getgid,
            IdKind::EffectiveGid => Op::Getegid,
        }
    }
}

// ============================================================================
// Strategy Trait
// ============================================================================

/// One way of satisfying the POSIX operations
///
/// Methods for operations outside [`supports`](Strategy::supports) are
/// never called by the facade.
pub trait Strategy: Send + Sync {
    /// Name of this strategy (for logging/debugging)
    fn name(&self) -> &'static str;

    fn supports(&self, op: Op) -> bool;

    /// Metadata of the final target of `path`.
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Metadata of `path` itself.
    fn lstat(&self, path: &Path) -> Result<FileStat>;

    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// `None` leaves that id unchanged.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()>;

    fn link(&self, original: &Path, link: &Path) -> Result<()>;

    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Target bytes of a symbolic link, at most `capacity` long.
    fn readlink(&self, path: &Path, capacity: usize) -> Result<Vec<u8>>;

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    /// Set access and modification times, in whole seconds.
    fn utime(&self, path: &Path, atime: i64, mtime: i64) -> Result<()>;

    /// `Ok(None)` when no entry matches.
    fn getpwnam(&self, name: &str) -> Result<Option<Passwd>>;

    /// `Ok(None)` when no entry matches.
    fn getpwuid(&self, uid: u32) -> Result<Option<Passwd>>;

    /// Snapshot of the whole database, in enumeration order.
    fn passwd_entries(&self) -> Result<Vec<Passwd>>;

    fn id(&self, which: IdKind) -> Result<u32>;

    fn getlogin(&self) -> Result<Option<String>>;
}
