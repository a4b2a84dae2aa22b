//! A file descriptor that closes itself on drop, unless it's been
//! explicitly consumed by [`FdGuard::close`].
//!
//! This is the crate's one piece of manual `unsafe` resource management: a
//! thin `OwnedFd`-shaped wrapper we control, rather than `std`'s
//! `std::os::fd::OwnedFd`, so it can carry a few extra conveniences (the
//! `libc`-returning constructor, `Debug`) without adding a dependency
//! boundary just for those.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// An owned file descriptor, closed on drop.
#[derive(Debug)]
pub struct FdGuard(RawFd);

impl FdGuard {
    /// Wraps an already-open descriptor. `fd` must be a valid, open,
    /// uniquely-owned descriptor.
    pub unsafe fn from_raw(fd: RawFd) -> FdGuard {
        debug_assert!(fd >= 0);
        FdGuard(fd)
    }

    /// The wrapped descriptor, without giving up ownership.
    pub fn as_raw(&self) -> RawFd {
        self.0
    }

    /// Closes the descriptor, consuming the guard.
    ///
    /// Unlike `Drop`, this surfaces the `close(2)` error rather than
    /// swallowing it, matching how the event loop needs to AND together
    /// the success of closing both of its descriptors.
    pub fn close(self) -> io::Result<()> {
        let fd = self.0;
        std::mem::forget(self);
        match unsafe { crate::sys::close(fd) } {
            0 => Ok(()),
            _ => Err(io::Error::last_os_error()),
        }
    }
}

impl AsRawFd for FdGuard {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        unsafe {
            crate::sys::close(self.0);
        }
    }
}
