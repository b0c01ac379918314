//! # vposix
//!
//! POSIX file-metadata, identity and user-database operations behind one
//! facade, satisfied by either of two strategies:
//!
//! - **native**: libc calls whose results are read through the platform's
//!   binary layout of `stat`, `passwd` and `utimbuf`
//! - **fallback**: the standard library plus external utilities (`ln`,
//!   `chown`, `chgrp`, `readlink`, `id`) with their exit status and output
//!   interpreted
//!
//! Strategy selection happens once, per operation, when a [`Posix`] is
//! built. Failures are reported to an [`ErrorSink`] and returned as an
//! [`ErrorKind`].
//!
//! # Usage
//!
//! ```ignore
//! use vposix::posix;
//!
//! let st = posix().stat("/etc/hosts")?;
//! println!("{} bytes, {}", st.size, st.ftype());
//! ```

pub mod descriptor;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod filestat;
#[cfg(unix)]
pub mod native;
pub mod passwd;
pub mod sink;
pub mod strategy;

use once_cell::sync::Lazy;

pub use descriptor::Descriptor;
pub use dispatch::DispatchTable;
pub use env::EnvMap;
pub use error::{BackendError, ErrorKind};
pub use facade::{Posix, PosixBuilder, PATH_MAX};
pub use filestat::FileStat;
pub use passwd::{Passwd, PasswdCursor};
pub use sink::{ErrorReport, ErrorSink, RecordingSink, TracingSink};
pub use strategy::{IdKind, Op, Strategy};
pub use vposix_layout::{Platform, Timestamp};

static POSIX: Lazy<Posix> = Lazy::new(Posix::new);

/// Process-wide facade built from the global configuration.
pub fn posix() -> &'static Posix {
    &POSIX
}
