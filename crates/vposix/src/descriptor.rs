//! Raw OS descriptor access.
//!
//! Types representing an open file expose the descriptor or handle they
//! own. Absence is `None`; `-1` is never used as a failure marker.

/// An object that may own an OS-level descriptor or handle
pub trait Descriptor {
    /// Unix file descriptor.
    fn raw_fd(&self) -> Option<i32> {
        None
    }

    /// Windows handle value.
    fn raw_handle(&self) -> Option<i64> {
        None
    }
}

#[cfg(unix)]
impl<T: std::os::unix::io::AsRawFd> Descriptor for T {
    fn raw_fd(&self) -> Option<i32> {
        let fd = self.as_raw_fd();
        (fd >= 0).then_some(fd)
    }
}

#[cfg(windows)]
impl<T: std::os::windows::io::AsRawHandle> Descriptor for T {
    fn raw_handle(&self) -> Option<i64> {
        let handle = self.as_raw_handle();
        (!handle.is_null()).then_some(handle as isize as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_file_exposes_fd() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.raw_fd().unwrap();
        assert!(fd > 2);
        assert_eq!(file.raw_handle(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_zero() {
        assert_eq!(std::io::stdin().raw_fd(), Some(0));
    }
}
