//! `struct stat` layouts.
//!
//! Field names are normalised across variants (`dev`, `ino`, `mode`,
//! `nlink`, `uid`, `gid`, `rdev`, `size`, `blksize`, `blocks`, `atime`,
//! `mtime`, `ctime`, and `birthtime` where the platform records it).
//! Reserved words keep a `__` prefix.
//!
//! The 32-bit Linux and Solaris variants are the large-file `stat64`
//! structures, which is what the native path calls on those targets.

use crate::field::Abi;
use crate::platform::{AddrWidth, OsFamily, Platform};
use crate::StructLayout;

crate::struct_layout! {
    pub const TIMESPEC_64 @ Abi::LP64 => "timespec" {
        sec: i64,
        nsec: i64,
    }
}

crate::struct_layout! {
    pub const TIMESPEC_32 @ Abi::ILP32 => "timespec" {
        sec: i32,
        nsec: i32,
    }
}

crate::struct_layout! {
    /// glibc x86_64 `struct stat`
    pub const LINUX_64 @ Abi::LP64 => "stat" {
        dev: u64,
        ino: u64,
        nlink: u64,
        mode: u32,
        uid: u32,
        gid: u32,
        __pad0: i32,
        rdev: u64,
        size: i64,
        blksize: i64,
        blocks: i64,
        atime: {TIMESPEC_64},
        mtime: {TIMESPEC_64},
        ctime: {TIMESPEC_64},
        __unused: [i64; 3],
    }
}

crate::struct_layout! {
    /// glibc i386 `struct stat64`
    pub const LINUX_32 @ Abi::ILP32 => "stat64" {
        dev: u64,
        __pad1: u32,
        __ino32: u32,
        mode: u32,
        nlink: u32,
        uid: u32,
        gid: u32,
        rdev: u64,
        __pad2: u32,
        size: i64,
        blksize: i32,
        blocks: i64,
        atime: {TIMESPEC_32},
        mtime: {TIMESPEC_32},
        ctime: {TIMESPEC_32},
        ino: u64,
    }
}

crate::struct_layout! {
    /// Darwin `struct stat` with 64-bit inodes
    pub const MACOS_64 @ Abi::LP64 => "stat" {
        dev: i32,
        mode: u16,
        nlink: u16,
        ino: u64,
        uid: u32,
        gid: u32,
        rdev: i32,
        atime: {TIMESPEC_64},
        mtime: {TIMESPEC_64},
        ctime: {TIMESPEC_64},
        birthtime: {TIMESPEC_64},
        size: i64,
        blocks: i64,
        blksize: i32,
        flags: u32,
        gen: u32,
        __lspare: i32,
        __qspare: [i64; 2],
    }
}

crate::struct_layout! {
    /// Darwin i386 `struct stat64`
    pub const MACOS_32 @ Abi::ILP32 => "stat64" {
        dev: i32,
        mode: u16,
        nlink: u16,
        ino: u64,
        uid: u32,
        gid: u32,
        rdev: i32,
        atime: {TIMESPEC_32},
        mtime: {TIMESPEC_32},
        ctime: {TIMESPEC_32},
        birthtime: {TIMESPEC_32},
        size: i64,
        blocks: i64,
        blksize: i32,
        flags: u32,
        gen: u32,
        __lspare: i32,
        __qspare: [i64; 2],
    }
}

crate::struct_layout! {
    /// FreeBSD 12+ `struct stat` (64-bit inodes)
    pub const FREEBSD_64 @ Abi::LP64 => "stat" {
        dev: u64,
        ino: u64,
        nlink: u64,
        mode: u16,
        __pad0: i16,
        uid: u32,
        gid: u32,
        __pad1: i32,
        rdev: u64,
        atime: {TIMESPEC_64},
        mtime: {TIMESPEC_64},
        ctime: {TIMESPEC_64},
        birthtime: {TIMESPEC_64},
        size: i64,
        blocks: i64,
        blksize: i32,
        flags: u32,
        gen: u64,
        __spare: [u64; 10],
    }
}

crate::struct_layout! {
    /// OpenBSD amd64 `struct stat`
    pub const OPENBSD_64 @ Abi::LP64 => "stat" {
        mode: u32,
        dev: i32,
        ino: u64,
        nlink: u32,
        uid: u32,
        gid: u32,
        rdev: i32,
        atime: {TIMESPEC_64},
        mtime: {TIMESPEC_64},
        ctime: {TIMESPEC_64},
        size: i64,
        blocks: i64,
        blksize: u32,
        flags: u32,
        gen: u32,
        birthtime: {TIMESPEC_64},
    }
}

crate::struct_layout! {
    /// Solaris LP64 `struct stat`
    pub const SOLARIS_64 @ Abi::LP64 => "stat" {
        dev: u64,
        ino: u64,
        mode: u32,
        nlink: u32,
        uid: u32,
        gid: u32,
        rdev: u64,
        size: i64,
        atime: {TIMESPEC_64},
        mtime: {TIMESPEC_64},
        ctime: {TIMESPEC_64},
        blksize: i32,
        blocks: i64,
        fstype: [u8; 16],
    }
}

crate::struct_layout! {
    /// Solaris i386 `struct stat64`
    pub const SOLARIS_32 @ Abi::ILP32 => "stat64" {
        dev: u32,
        __pad1: [i32; 3],
        ino: u64,
        mode: u32,
        nlink: u32,
        uid: u32,
        gid: u32,
        rdev: u32,
        __pad2: [i32; 2],
        size: i64,
        atime: {TIMESPEC_32},
        mtime: {TIMESPEC_32},
        ctime: {TIMESPEC_32},
        blksize: i32,
        blocks: i64,
        fstype: [u8; 16],
        __pad4: [i32; 8],
    }
}

/// Every supported {platform, layout} pair
pub const VARIANTS: &[(Platform, &StructLayout)] = &[
    (Platform::new(OsFamily::Linux, AddrWidth::Bits64), &LINUX_64),
    (Platform::new(OsFamily::Linux, AddrWidth::Bits32), &LINUX_32),
    (Platform::new(OsFamily::MacOs, AddrWidth::Bits64), &MACOS_64),
    (Platform::new(OsFamily::MacOs, AddrWidth::Bits32), &MACOS_32),
    (Platform::new(OsFamily::FreeBsd, AddrWidth::Bits64), &FREEBSD_64),
    (Platform::new(OsFamily::OpenBsd, AddrWidth::Bits64), &OPENBSD_64),
    (Platform::new(OsFamily::Solaris, AddrWidth::Bits64), &SOLARIS_64),
    (Platform::new(OsFamily::Solaris, AddrWidth::Bits32), &SOLARIS_32),
];

/// The `stat` layout for a platform, if one is modelled.
pub fn layout_for(platform: Platform) -> Option<&'static StructLayout> {
    VARIANTS
        .iter()
        .find(|(p, _)| *p == platform)
        .map(|(_, layout)| *layout)
}
