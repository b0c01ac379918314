//! Host `stat` and user-database entry points.
//!
//! 32-bit Linux reads the large-file `stat64` structure so that sizes and
//! inode numbers are never truncated.

use libc::{c_char, c_int};

#[cfg(all(target_os = "linux", target_pointer_width = "32"))]
mod imp {
    use super::*;

    pub type RawStat = libc::stat64;

    pub unsafe fn stat(path: *const c_char, buf: *mut RawStat) -> c_int {
        libc::stat64(path, buf)
    }

    pub unsafe fn lstat(path: *const c_char, buf: *mut RawStat) -> c_int {
        libc::lstat64(path, buf)
    }
}

#[cfg(not(all(target_os = "linux", target_pointer_width = "32")))]
mod imp {
    use super::*;

    pub type RawStat = libc::stat;

    pub unsafe fn stat(path: *const c_char, buf: *mut RawStat) -> c_int {
        libc::stat(path, buf)
    }

    pub unsafe fn lstat(path: *const c_char, buf: *mut RawStat) -> c_int {
        libc::lstat(path, buf)
    }
}

pub use imp::{lstat, stat, RawStat};

// User-database iterator; one cursor per process inside libc
extern "C" {
    pub fn setpwent();
    pub fn getpwent() -> *mut libc::passwd;
    pub fn endpwent();
}

pub const STAT_SIZE: usize = std::mem::size_of::<RawStat>();
pub const PASSWD_SIZE: usize = std::mem::size_of::<libc::passwd>();
pub const UTIMBUF_SIZE: usize = std::mem::size_of::<libc::utimbuf>();
