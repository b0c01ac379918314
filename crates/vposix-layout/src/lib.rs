//! # vposix-layout
//!
//! Declarative binary layouts of the kernel and C library structures the
//! POSIX facade reads and writes directly: `stat`, `passwd` and `utimbuf`.
//!
//! ## Model
//!
//! - [`Platform`]: {OS family × address width} tag, detected once
//! - [`StructLayout`]: ordered fields with offsets computed at compile time
//! - [`StructBuffer`] / [`Populated`] / [`View`]: raw storage that becomes
//!   readable only after the filling call succeeds
//!
//! ## Variant tables
//!
//! Each structure module exposes a flat `VARIANTS` table and a
//! `layout_for(platform)` lookup; platforms without an entry have no
//! native layout and are served by the fallback strategy.

pub mod error;
pub mod field;
pub mod passwd;
pub mod platform;
mod raw;
pub mod stat;
pub mod utimbuf;

pub use error::{LayoutError, Result};
pub use field::{Abi, Field, FieldKind, FieldType, Scalar, StructLayout};
pub use platform::{AddrWidth, OsFamily, Platform};
pub use raw::{Populated, StructBuffer, Timestamp, View};
