//! Platform tag detection.
//!
//! A [`Platform`] is the pair {OS family × address width}. It is detected
//! once per process and every layout/dispatch decision is keyed on it.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::field::Abi;
use crate::LayoutError;

static CURRENT: Lazy<Platform> = Lazy::new(Platform::detect);

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    MacOs,
    FreeBsd,
    OpenBsd,
    Solaris,
    Windows,
    Other,
}

impl OsFamily {
    pub const ALL: [OsFamily; 7] = [
        OsFamily::Linux,
        OsFamily::MacOs,
        OsFamily::FreeBsd,
        OsFamily::OpenBsd,
        OsFamily::Solaris,
        OsFamily::Windows,
        OsFamily::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::MacOs => "macos",
            OsFamily::FreeBsd => "freebsd",
            OsFamily::OpenBsd => "openbsd",
            OsFamily::Solaris => "solaris",
            OsFamily::Windows => "windows",
            OsFamily::Other => "other",
        }
    }

    /// Whether the family exposes a POSIX C library at all
    pub fn is_unix(&self) -> bool {
        !matches!(self, OsFamily::Windows | OsFamily::Other)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "macos" | "darwin" | "osx" => Ok(OsFamily::MacOs),
            "freebsd" => Ok(OsFamily::FreeBsd),
            "openbsd" => Ok(OsFamily::OpenBsd),
            "solaris" | "sunos" | "illumos" => Ok(OsFamily::Solaris),
            "windows" => Ok(OsFamily::Windows),
            "other" => Ok(OsFamily::Other),
            _ => Err(LayoutError::UnknownPlatform(s.to_string())),
        }
    }
}

/// Address width of the target ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrWidth {
    Bits32,
    Bits64,
}

impl AddrWidth {
    pub const fn bytes(self) -> usize {
        match self {
            AddrWidth::Bits32 => 4,
            AddrWidth::Bits64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            AddrWidth::Bits32 => 32,
            AddrWidth::Bits64 => 64,
        }
    }

    pub fn from_bits(bits: u32) -> Result<Self, LayoutError> {
        match bits {
            32 => Ok(AddrWidth::Bits32),
            64 => Ok(AddrWidth::Bits64),
            other => Err(LayoutError::UnknownPlatform(format!("{}-bit", other))),
        }
    }
}

/// {OS family × address width} tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: OsFamily,
    pub width: AddrWidth,
}

impl Platform {
    pub const fn new(os: OsFamily, width: AddrWidth) -> Self {
        Self { os, width }
    }

    /// Platform of the running process, detected once.
    pub fn current() -> Platform {
        *CURRENT
    }

    /// Detect from compile-time target configuration.
    pub fn detect() -> Self {
        let os = if cfg!(target_os = "linux") || cfg!(target_os = "android") {
            OsFamily::Linux
        } else if cfg!(target_os = "macos") || cfg!(target_os = "ios") {
            OsFamily::MacOs
        } else if cfg!(target_os = "freebsd") {
            OsFamily::FreeBsd
        } else if cfg!(target_os = "openbsd") {
            OsFamily::OpenBsd
        } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            OsFamily::Solaris
        } else if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Other
        };

        let width = if cfg!(target_pointer_width = "64") {
            AddrWidth::Bits64
        } else {
            AddrWidth::Bits32
        };

        Self { os, width }
    }

    /// C ABI used to compute field offsets.
    ///
    /// 32-bit variants model the i386 System V ABI, where 64-bit integers
    /// are only 4-byte aligned.
    pub const fn abi(&self) -> Abi {
        match self.width {
            AddrWidth::Bits32 => Abi::ILP32,
            AddrWidth::Bits64 => Abi::LP64,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.width.bits())
    }
}

impl FromStr for Platform {
    type Err = LayoutError;

    /// Parses `os/bits`, e.g. `solaris/32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, bits) = s
            .split_once('/')
            .ok_or_else(|| LayoutError::UnknownPlatform(s.to_string()))?;
        let bits: u32 = bits
            .parse()
            .map_err(|_| LayoutError::UnknownPlatform(s.to_string()))?;
        Ok(Self::new(os.parse()?, AddrWidth::from_bits(bits)?))
    }
}
