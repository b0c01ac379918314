//! Native strategy: libc calls filling buffers described by the platform
//! layouts in `vposix-layout`.
//!
//! A layout is only used when its modelled size equals the size of the
//! structure the host libc fills. Structures that fail this check are
//! served by the fallback strategy instead.

mod sys;

use std::ffi::{CStr, CString, OsString};
use std::fs;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Mutex;

use libc::{c_char, c_int};
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};
use vposix_config::{log_native_debug, log_native_warn};
use vposix_layout::{passwd, stat, utimbuf, Platform, Populated, StructBuffer, StructLayout, View};

use crate::error::{BackendError, Result};
use crate::filestat::FileStat;
use crate::passwd::{parse_file, Passwd};
use crate::strategy::{IdKind, Op, Strategy};

/// Scratch size when `_SC_GETPW_R_SIZE_MAX` is indeterminate
const DEFAULT_PW_SCRATCH: usize = 1024;
const MAX_PW_SCRATCH: usize = 1 << 20;

/// `setpwent`/`getpwent` share one iterator per process
static PWENT: Mutex<()> = Mutex::new(());

/// Outcome of one `getpw*_r` attempt that did not succeed
enum Fill {
    Retry,
    Failed(c_int),
}

pub struct Native {
    platform: Platform,
    stat_layout: Option<&'static StructLayout>,
    passwd_layout: Option<&'static StructLayout>,
    utimbuf_layout: Option<&'static StructLayout>,
    passwd_file: Option<PathBuf>,
}

/// Accept `layout` only if it describes exactly `host_size` bytes.
fn verified(layout: Option<&'static StructLayout>, host_size: usize) -> Option<&'static StructLayout> {
    let layout = layout?;
    if layout.size() == host_size {
        return Some(layout);
    }
    log_native_warn!(
        "layout size mismatch, native path disabled",
        layout = layout.name(),
        modelled = layout.size(),
        host = host_size,
    );
    None
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| BackendError::Nul {
        path: path.to_path_buf(),
    })
}

/// Copy a NUL-terminated string out of C memory.
///
/// # Safety
///
/// `addr` is zero or points at a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn c_bytes(addr: usize) -> Option<Vec<u8>> {
    if addr == 0 {
        return None;
    }
    Some(CStr::from_ptr(addr as *const c_char).to_bytes().to_vec())
}

/// # Safety
///
/// `view` was filled by a successful host `getpw*_r` call whose scratch
/// buffer is still alive, or copied from a `getpwent` record before the
/// next call into the iterator.
unsafe fn decode_passwd(view: View<'_>) -> Result<Passwd> {
    let text = |name: &str| -> Result<Vec<u8>> {
        Ok(c_bytes(view.read_ptr(name)?).unwrap_or_default())
    };
    let gecos = text("gecos")?;

    Ok(Passwd {
        name: String::from_utf8_lossy(&text("name")?).into_owned(),
        uid: view.read_u32("uid")?,
        gid: view.read_u32("gid")?,
        gecos: (!gecos.is_empty()).then(|| String::from_utf8_lossy(&gecos).into_owned()),
        dir: PathBuf::from(OsString::from_vec(text("dir")?)),
        shell: PathBuf::from(OsString::from_vec(text("shell")?)),
    })
}

fn initial_pw_scratch() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions
    let hint = unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) };
    if hint > 0 {
        (hint as usize).min(MAX_PW_SCRATCH)
    } else {
        DEFAULT_PW_SCRATCH
    }
}

impl Native {
    /// Native strategy for `platform`, which must be the running host.
    pub fn probe(platform: Platform) -> Option<Self> {
        if platform != Platform::current() {
            log_native_debug!(
                "native strategy unavailable for foreign platform",
                requested = tracing::field::display(platform),
            );
            return None;
        }
        Some(Self {
            platform,
            stat_layout: verified(stat::layout_for(platform), sys::STAT_SIZE),
            passwd_layout: verified(passwd::layout_for(platform), sys::PASSWD_SIZE),
            utimbuf_layout: verified(utimbuf::layout_for(platform), sys::UTIMBUF_SIZE),
            passwd_file: None,
        })
    }

    /// Serve the whole user database, lookups and enumeration alike,
    /// from a `passwd(5)` file instead of the host libc.
    pub fn with_passwd_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.passwd_file = Some(path.into());
        self
    }

    pub fn stat_layout(&self) -> Option<&'static StructLayout> {
        self.stat_layout
    }

    pub fn passwd_layout(&self) -> Option<&'static StructLayout> {
        self.passwd_layout
    }

    pub fn utimbuf_layout(&self) -> Option<&'static StructLayout> {
        self.utimbuf_layout
    }

    fn read_stat(&self, path: &Path, follow: bool) -> Result<FileStat> {
        let op = if follow { "stat" } else { "lstat" };
        let layout = self.stat_layout.ok_or(BackendError::Unsupported(op))?;
        let c = c_path(path)?;

        let populated = StructBuffer::zeroed(layout).populate(|ptr| {
            let buf = ptr.cast::<sys::RawStat>();
            // SAFETY: the buffer holds size_of::<RawStat>() bytes (checked
            // in `verified`) and is 8-byte aligned
            let rc = unsafe {
                if follow {
                    sys::stat(c.as_ptr(), buf)
                } else {
                    sys::lstat(c.as_ptr(), buf)
                }
            };
            if rc == 0 {
                Ok(())
            } else {
                Err(BackendError::last_os(op, path))
            }
        })?;

        Ok(FileStat::from_view(populated.view(), self.platform)?)
    }

    fn lookup_passwd<F>(&self, op: &'static str, key: String, call: F) -> Result<Option<Passwd>>
    where
        F: Fn(*mut libc::passwd, *mut c_char, usize, *mut *mut libc::passwd) -> c_int,
    {
        let layout = self.passwd_layout.ok_or(BackendError::Unsupported(op))?;
        let mut scratch_len = initial_pw_scratch();

        loop {
            let mut scratch = vec![0u8; scratch_len];
            let mut found = false;
            let filled = StructBuffer::zeroed(layout).populate(|ptr| {
                let mut result: *mut libc::passwd = ptr::null_mut();
                let rc = call(ptr.cast(), scratch.as_mut_ptr().cast(), scratch.len(), &mut result);
                match rc {
                    0 => {
                        found = !result.is_null();
                        Ok(())
                    }
                    libc::ERANGE => Err(Fill::Retry),
                    e => Err(Fill::Failed(e)),
                }
            });

            match filled {
                // SAFETY: `scratch` backs every string pointer and outlives the decode
                Ok(populated) if found => return unsafe { decode_passwd(populated.view()) }.map(Some),
                Ok(_) => return Ok(None),
                Err(Fill::Retry) if scratch_len < MAX_PW_SCRATCH => scratch_len *= 2,
                Err(Fill::Retry) => {
                    return Err(BackendError::io(op, key, io::Error::from_raw_os_error(libc::ERANGE)))
                }
                // POSIX allows these for "no such entry"
                Err(Fill::Failed(libc::ENOENT | libc::ESRCH | libc::EBADF)) => return Ok(None),
                Err(Fill::Failed(e)) => {
                    return Err(BackendError::io(op, key, io::Error::from_raw_os_error(e)))
                }
            }
        }
    }
}

impl Native {
    fn file_entries(&self, path: &Path) -> Result<Vec<Passwd>> {
        let text = fs::read_to_string(path).map_err(|e| BackendError::io("getpwent", path, e))?;
        Ok(parse_file(&text))
    }

    /// Snapshot of the host database through `getpwent`, decoded with the
    /// same layout as keyed lookups.
    fn host_entries(&self) -> Result<Vec<Passwd>> {
        let layout = self.passwd_layout.ok_or(BackendError::Unsupported("getpwent"))?;
        let _guard = PWENT.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = Vec::new();
        // SAFETY: the iterator is only driven while `PWENT` is held
        unsafe { sys::setpwent() };
        let outcome = loop {
            // SAFETY: as above
            let record = unsafe { sys::getpwent() };
            if record.is_null() {
                break Ok(());
            }
            // SAFETY: `record` points at a host passwd, whose size equals
            // `layout.size()` (checked in `verified`)
            let bytes = unsafe { std::slice::from_raw_parts(record.cast::<u8>(), layout.size()) };
            let decoded = Populated::from_bytes(layout, bytes)
                .map_err(BackendError::from)
                // SAFETY: strings are copied before the next getpwent
                .and_then(|populated| unsafe { decode_passwd(populated.view()) });
            match decoded {
                Ok(entry) => entries.push(entry),
                Err(e) => break Err(e),
            }
        };
        // SAFETY: as above
        unsafe { sys::endpwent() };

        outcome.map(|()| entries)
    }
}

impl Strategy for Native {
    fn name(&self) -> &'static str {
        "native"
    }

    fn supports(&self, op: Op) -> bool {
        match op {
            Op::Stat | Op::Lstat => self.stat_layout.is_some(),
            Op::Getpwnam | Op::Getpwuid | Op::Getpwent => {
                self.passwd_layout.is_some() || self.passwd_file.is_some()
            }
            Op::Utime => self.utimbuf_layout.is_some(),
            _ => true,
        }
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        self.read_stat(path, true)
    }

    fn lstat(&self, path: &Path) -> Result<FileStat> {
        self.read_stat(path, false)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let c = c_path(path)?;
        // SAFETY: `c` is a valid NUL-terminated path
        let rc = unsafe { libc::chmod(c.as_ptr(), mode as libc::mode_t) };
        if rc == 0 {
            Ok(())
        } else {
            Err(BackendError::last_os("chmod", path))
        }
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        nix::unistd::chown(path, uid.map(Uid::from_raw), gid.map(Gid::from_raw))
            .map_err(|errno| BackendError::io("chown", path, io::Error::from(errno)))
    }

    fn link(&self, original: &Path, link: &Path) -> Result<()> {
        fs::hard_link(original, link).map_err(|e| BackendError::io("link", link, e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link).map_err(|e| BackendError::io("symlink", link, e))
    }

    fn readlink(&self, path: &Path, capacity: usize) -> Result<Vec<u8>> {
        let target = fs::read_link(path)
            .map_err(|e| BackendError::io("readlink", path, e))?
            .into_os_string()
            .into_vec();
        if target.len() > capacity {
            return Err(BackendError::Capacity {
                len: target.len(),
                capacity,
            });
        }
        Ok(target)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        nix::unistd::mkdir(path, Mode::from_bits_truncate(mode as libc::mode_t))
            .map_err(|errno| BackendError::io("mkdir", path, io::Error::from(errno)))
    }

    fn utime(&self, path: &Path, atime: i64, mtime: i64) -> Result<()> {
        let layout = self.utimbuf_layout.ok_or(BackendError::Unsupported("utime"))?;
        let c = c_path(path)?;

        let mut times = StructBuffer::zeroed(layout);
        times.set_int("actime", atime)?;
        times.set_int("modtime", mtime)?;

        // SAFETY: `times` is a fully initialised utimbuf of the host size
        let rc = unsafe { libc::utime(c.as_ptr(), times.as_ptr().cast()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(BackendError::last_os("utime", path))
        }
    }

    fn getpwnam(&self, name: &str) -> Result<Option<Passwd>> {
        if let Some(path) = &self.passwd_file {
            return Ok(self.file_entries(path)?.into_iter().find(|e| e.name == name));
        }
        let Ok(c_name) = CString::new(name) else {
            return Ok(None);
        };
        self.lookup_passwd("getpwnam", name.to_string(), |pwd, buf, len, result| {
            // SAFETY: all pointers come from live buffers owned by lookup_passwd
            unsafe { libc::getpwnam_r(c_name.as_ptr(), pwd, buf, len, result) }
        })
    }

    fn getpwuid(&self, uid: u32) -> Result<Option<Passwd>> {
        if let Some(path) = &self.passwd_file {
            return Ok(self.file_entries(path)?.into_iter().find(|e| e.uid == uid));
        }
        self.lookup_passwd("getpwuid", uid.to_string(), |pwd, buf, len, result| {
            // SAFETY: as above
            unsafe { libc::getpwuid_r(uid as libc::uid_t, pwd, buf, len, result) }
        })
    }

    fn passwd_entries(&self) -> Result<Vec<Passwd>> {
        match &self.passwd_file {
            Some(path) => self.file_entries(path),
            None => self.host_entries(),
        }
    }

    fn id(&self, which: IdKind) -> Result<u32> {
        Ok(match which {
            IdKind::RealUid => nix::unistd::getuid().as_raw(),
            IdKind::EffectiveUid => nix::unistd::geteuid().as_raw(),
            IdKind::RealGid => nix::unistd::getgid().as_raw(),
            IdKind::EffectiveGid => nix::unistd::getegid().as_raw(),
        })
    }

    /// `None` when the process has no controlling terminal session.
    fn getlogin(&self) -> Result<Option<String>> {
        // SAFETY: getlogin returns null or a pointer to static storage,
        // copied out here before any other libc call
        let name = unsafe { c_bytes(libc::getlogin() as usize) };
        Ok(name
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .filter(|n| !n.is_empty()))
    }
}
