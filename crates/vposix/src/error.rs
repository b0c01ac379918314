//! Error taxonomy.
//!
//! Backends fail with a [`BackendError`] that keeps the exact cause
//! (errno, launch failure, exit status, unparseable output). The facade
//! reports it to the [`ErrorSink`](crate::sink::ErrorSink) and hands the
//! caller the coarse [`ErrorKind`].

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use vposix_exec::ExecError;
use vposix_layout::LayoutError;

/// POSIX-domain failure classes returned by the facade
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[error("no such file or directory")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("input/output error")]
    Io,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("operation not implemented on this platform")]
    Unimplemented,

    /// Some steps of a composite operation took effect before another
    /// failed. Nothing is rolled back.
    #[error("operation partially applied")]
    PartialFailure,
}

impl ErrorKind {
    pub fn from_io(err: &io::Error) -> Self {
        #[cfg(unix)]
        if let Some(raw) = err.raw_os_error() {
            return Self::from_raw_os_error(raw);
        }
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidArgument,
            io::ErrorKind::Unsupported => ErrorKind::Unimplemented,
            _ => ErrorKind::Io,
        }
    }

    #[cfg(unix)]
    pub fn from_raw_os_error(raw: i32) -> Self {
        match raw {
            libc::ENOENT | libc::ENOTDIR => ErrorKind::NotFound,
            libc::EACCES | libc::EPERM => ErrorKind::PermissionDenied,
            libc::EINVAL | libc::ENAMETOOLONG | libc::ERANGE | libc::EEXIST => {
                ErrorKind::InvalidArgument
            }
            libc::ENOSYS | libc::ENOTSUP => ErrorKind::Unimplemented,
            _ => ErrorKind::Io,
        }
    }

    #[cfg(unix)]
    pub fn from_errno(errno: nix::errno::Errno) -> Self {
        Self::from_raw_os_error(errno as i32)
    }

    /// Representative errno for this kind.
    #[cfg(unix)]
    pub fn errno(self) -> nix::errno::Errno {
        use nix::errno::Errno;
        match self {
            ErrorKind::NotFound => Errno::ENOENT,
            ErrorKind::PermissionDenied => Errno::EACCES,
            ErrorKind::Io | ErrorKind::PartialFailure => Errno::EIO,
            ErrorKind::InvalidArgument => Errno::EINVAL,
            ErrorKind::Unimplemented => Errno::ENOSYS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::Io => "Io",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Unimplemented => "Unimplemented",
            ErrorKind::PartialFailure => "PartialFailure",
        }
    }
}

impl From<ErrorKind> for io::ErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::PermissionDenied => io::ErrorKind::PermissionDenied,
            ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
            ErrorKind::Unimplemented => io::ErrorKind::Unsupported,
            ErrorKind::Io | ErrorKind::PartialFailure => io::ErrorKind::Other,
        }
    }
}

/// Exact cause of a failed native or fallback operation
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("`{program}` exited with status {code}")]
    Exit { program: String, code: i32 },

    #[error("unparseable output from `{program}`: {output:?}")]
    Parse { program: String, output: String },

    #[error("{} is not a symbolic link", .path.display())]
    NotALink { path: PathBuf },

    #[error("link target of {len} bytes exceeds capacity of {capacity}")]
    Capacity { len: usize, capacity: usize },

    #[error("{op} {}: {completed} applied, then {source}", .path.display())]
    Partial {
        op: &'static str,
        path: PathBuf,
        completed: &'static str,
        #[source]
        source: Box<BackendError>,
    },

    #[error("path contains an interior NUL byte: {}", .path.display())]
    Nul { path: PathBuf },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("{0} is not supported by this strategy")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, BackendError>;

impl BackendError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BackendError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// `io::Error::last_os_error()` attributed to `op` on `path`.
    pub fn last_os(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::io(op, path, io::Error::last_os_error())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Io { source, .. } => ErrorKind::from_io(source),
            BackendError::Exec(_) | BackendError::Exit { .. } | BackendError::Parse { .. } => {
                ErrorKind::Io
            }
            BackendError::NotALink { .. }
            | BackendError::Capacity { .. }
            | BackendError::Nul { .. } => ErrorKind::InvalidArgument,
            BackendError::Partial { .. } => ErrorKind::PartialFailure,
            BackendError::Layout(_) => ErrorKind::Io,
            BackendError::Unsupported(_) => ErrorKind::Unimplemented,
        }
    }

    /// OS error number behind this failure, when there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            BackendError::Io { source, .. } => source.raw_os_error(),
            BackendError::Partial { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_mapping() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::NotFound);
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::Io);
    }

    #[cfg(unix)]
    #[test]
    fn test_errno_mapping() {
        use nix::errno::Errno;
        let err = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::PermissionDenied);
        assert_eq!(ErrorKind::from_errno(Errno::ENOTDIR), ErrorKind::NotFound);
        assert_eq!(ErrorKind::NotFound.errno(), Errno::ENOENT);
        assert_eq!(ErrorKind::from_errno(ErrorKind::Unimplemented.errno()), ErrorKind::Unimplemented);
    }

    #[test]
    fn test_backend_kinds() {
        let partial = BackendError::Partial {
            op: "chown",
            path: PathBuf::from("/tmp/x"),
            completed: "owner",
            source: Box::new(BackendError::Exit {
                program: "chgrp".into(),
                code: 1,
            }),
        };
        assert_eq!(partial.kind(), ErrorKind::PartialFailure);
        assert!(partial.to_string().contains("owner applied"));

        let capacity = BackendError::Capacity { len: 10, capacity: 4 };
        assert_eq!(capacity.kind(), ErrorKind::InvalidArgument);
        assert_eq!(BackendError::Unsupported("chmod").kind(), ErrorKind::Unimplemented);
    }

    #[test]
    fn test_io_kind_roundtrip_into_std() {
        let kind: io::ErrorKind = ErrorKind::PermissionDenied.into();
        assert_eq!(kind, io::ErrorKind::PermissionDenied);
    }
}
