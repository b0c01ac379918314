//! `struct utimbuf`: access and modification times in whole seconds.

use crate::field::Abi;
use crate::platform::{AddrWidth, Platform};
use crate::StructLayout;

crate::struct_layout! {
    pub const UTIMBUF_64 @ Abi::LP64 => "utimbuf" {
        actime: long,
        modtime: long,
    }
}

crate::struct_layout! {
    pub const UTIMBUF_32 @ Abi::ILP32 => "utimbuf" {
        actime: long,
        modtime: long,
    }
}

/// Every unix family shares the `{time_t, time_t}` shape.
pub fn layout_for(platform: Platform) -> Option<&'static StructLayout> {
    if !platform.os.is_unix() {
        return None;
    }
    match platform.width {
        AddrWidth::Bits64 => Some(&UTIMBUF_64),
        AddrWidth::Bits32 => Some(&UTIMBUF_32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OsFamily;

    #[test]
    fn test_sizes() {
        assert_eq!(UTIMBUF_64.size(), 16);
        assert_eq!(UTIMBUF_32.size(), 8);
        assert_eq!(UTIMBUF_64.field("modtime").unwrap().offset, 8);
    }

    #[test]
    fn test_windows_has_no_utimbuf() {
        assert!(layout_for(Platform::new(OsFamily::Windows, AddrWidth::Bits64)).is_none());
    }

    #[cfg(all(unix, target_pointer_width = "64"))]
    #[test]
    fn test_host_matches_libc() {
        assert_eq!(UTIMBUF_64.size(), std::mem::size_of::<libc::utimbuf>());
    }
}
