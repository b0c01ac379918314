//! File metadata for one path at one point in time.

use std::fs::Metadata;

use serde::Serialize;
use vposix_layout::{AddrWidth, LayoutError, OsFamily, Platform, Timestamp, View};

// File type and permission bits. The values are identical on every unix
// family with a modelled layout.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;
pub const S_ISUID: u32 = 0o4000;
pub const S_ISGID: u32 = 0o2000;
pub const S_ISVTX: u32 = 0o1000;

/// Populated `stat` record
///
/// Immutable once built; callers own their copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: i64,
    pub blksize: i64,
    pub blocks: i64,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthtime: Option<Timestamp>,
    /// Decides how `rdev` splits into major and minor numbers
    #[serde(skip)]
    platform: Platform,
}

fn unsigned(view: &View<'_>, name: &str) -> Result<u64, LayoutError> {
    // Some platforms declare dev_t and friends signed
    view.read_u64(name)
        .or_else(|_| view.read_i64(name).map(|v| v as u64))
}

impl FileStat {
    /// Decode a native `stat` buffer.
    pub fn from_view(view: View<'_>, platform: Platform) -> Result<Self, LayoutError> {
        let layout = view.layout();
        Ok(Self {
            dev: unsigned(&view, "dev")?,
            ino: unsigned(&view, "ino")?,
            mode: view.read_u32("mode")?,
            nlink: unsigned(&view, "nlink")?,
            uid: view.read_u32("uid")?,
            gid: view.read_u32("gid")?,
            rdev: unsigned(&view, "rdev")?,
            size: view.read_i64("size")?,
            blksize: view.read_i64("blksize")?,
            blocks: view.read_i64("blocks")?,
            atime: view.read_timestamp("atime")?,
            mtime: view.read_timestamp("mtime")?,
            ctime: view.read_timestamp("ctime")?,
            birthtime: if layout.has_field("birthtime") {
                Some(view.read_timestamp("birthtime")?)
            } else {
                None
            },
            platform,
        })
    }

    /// Build from metadata obtained through the standard library.
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev(),
            size: meta.size() as i64,
            blksize: meta.blksize() as i64,
            blocks: meta.blocks() as i64,
            atime: Timestamp::new(meta.atime(), meta.atime_nsec() as u32),
            mtime: Timestamp::new(meta.mtime(), meta.mtime_nsec() as u32),
            ctime: Timestamp::new(meta.ctime(), meta.ctime_nsec() as u32),
            birthtime: meta.created().ok().map(Timestamp::from_system_time),
            platform: Platform::current(),
        }
    }

    /// Build from metadata obtained through the standard library.
    ///
    /// Without unix metadata the mode is synthesised from the file type and
    /// the read-only flag; ids and device numbers are zero.
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ftype = meta.file_type();
        let mode = if ftype.is_symlink() {
            S_IFLNK | 0o777
        } else if ftype.is_dir() {
            S_IFDIR | 0o755
        } else if meta.permissions().readonly() {
            S_IFREG | 0o444
        } else {
            S_IFREG | 0o644
        };
        let stamp = |t: std::io::Result<std::time::SystemTime>| {
            t.map(Timestamp::from_system_time).unwrap_or_default()
        };
        let size = meta.len() as i64;

        Self {
            dev: 0,
            ino: 0,
            mode,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            size,
            blksize: 4096,
            blocks: (size + 511) / 512,
            atime: stamp(meta.accessed()),
            mtime: stamp(meta.modified()),
            ctime: stamp(meta.modified()),
            birthtime: meta.created().ok().map(Timestamp::from_system_time),
            platform: Platform::current(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn file_type_bits(&self) -> u32 {
        self.mode & S_IFMT
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    pub fn is_file(&self) -> bool {
        self.file_type_bits() == S_IFREG
    }

    pub fn is_directory(&self) -> bool {
        self.file_type_bits() == S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type_bits() == S_IFLNK
    }

    pub fn is_fifo(&self) -> bool {
        self.file_type_bits() == S_IFIFO
    }

    pub fn is_socket(&self) -> bool {
        self.file_type_bits() == S_IFSOCK
    }

    pub fn is_char_device(&self) -> bool {
        self.file_type_bits() == S_IFCHR
    }

    pub fn is_block_device(&self) -> bool {
        self.file_type_bits() == S_IFBLK
    }

    pub fn is_setuid(&self) -> bool {
        self.mode & S_ISUID != 0
    }

    pub fn is_setgid(&self) -> bool {
        self.mode & S_ISGID != 0
    }

    pub fn is_sticky(&self) -> bool {
        self.mode & S_ISVTX != 0
    }

    pub fn ftype(&self) -> &'static str {
        match self.file_type_bits() {
            S_IFREG => "file",
            S_IFDIR => "directory",
            S_IFLNK => "link",
            S_IFCHR => "characterSpecial",
            S_IFBLK => "blockSpecial",
            S_IFIFO => "fifo",
            S_IFSOCK => "socket",
            _ => "unknown",
        }
    }

    /// Major number of a special file's device.
    pub fn major(&self) -> u64 {
        split_dev(self.rdev, self.platform).0
    }

    /// Minor number of a special file's device.
    pub fn minor(&self) -> u64 {
        split_dev(self.rdev, self.platform).1
    }
}

/// `dev_t` packing differs per family and, on Solaris, per width.
pub fn split_dev(dev: u64, platform: Platform) -> (u64, u64) {
    match (platform.os, platform.width) {
        (OsFamily::Linux, _) => (
            ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff),
            (dev & 0xff) | ((dev >> 12) & !0xff),
        ),
        (OsFamily::MacOs, _) => ((dev >> 24) & 0xff, dev & 0xff_ffff),
        (OsFamily::FreeBsd, _) => (
            ((dev >> 32) & 0xffff_ff00) | ((dev >> 8) & 0xff),
            ((dev >> 24) & 0xff00) | (dev & 0xffff_00ff),
        ),
        (OsFamily::OpenBsd, _) => ((dev >> 8) & 0xff, (dev & 0xff) | ((dev & 0xffff_0000) >> 8)),
        (OsFamily::Solaris, AddrWidth::Bits64) => (dev >> 32, dev & 0xffff_ffff),
        (OsFamily::Solaris, AddrWidth::Bits32) => (dev >> 18, dev & 0x3_ffff),
        (OsFamily::Windows | OsFamily::Other, _) => (0, 0),
    }
}
