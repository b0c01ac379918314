//! `struct passwd` layouts.
//!
//! String members are pointers into a caller-supplied scratch buffer.
//! They are only meaningful for the host variant, inside the lifetime of
//! the buffer handed to `getpwnam_r` / `getpwuid_r`.

use crate::field::Abi;
use crate::platform::{AddrWidth, OsFamily, Platform};
use crate::StructLayout;

crate::struct_layout! {
    pub const LINUX_64 @ Abi::LP64 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
    }
}

crate::struct_layout! {
    pub const LINUX_32 @ Abi::ILP32 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
    }
}

crate::struct_layout! {
    pub const MACOS_64 @ Abi::LP64 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        change: long,
        class: ptr,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
        expire: long,
    }
}

crate::struct_layout! {
    pub const MACOS_32 @ Abi::ILP32 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        change: long,
        class: ptr,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
        expire: long,
    }
}

crate::struct_layout! {
    pub const FREEBSD_64 @ Abi::LP64 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        change: i64,
        class: ptr,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
        expire: i64,
        fields: i32,
    }
}

crate::struct_layout! {
    pub const OPENBSD_64 @ Abi::LP64 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        change: i64,
        class: ptr,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
        expire: i64,
    }
}

crate::struct_layout! {
    pub const SOLARIS_64 @ Abi::LP64 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        age: ptr,
        comment: ptr,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
    }
}

crate::struct_layout! {
    pub const SOLARIS_32 @ Abi::ILP32 => "passwd" {
        name: ptr,
        passwd: ptr,
        uid: u32,
        gid: u32,
        age: ptr,
        comment: ptr,
        gecos: ptr,
        dir: ptr,
        shell: ptr,
    }
}

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

pub fn layout_for(platform: Platform) -> Option<&'static StructLayout> {
    VARIANTS
        .iter()
        .find(|(p, _)| *p == platform)
        .map(|(_, layout)| *layout)
}
