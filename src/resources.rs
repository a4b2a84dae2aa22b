//! Opening and closing the bundle of descriptors a live watch needs.
//!
//! Everything the event loop touches on every tick — the fanotify group,
//! the epoll instance it's registered with, and the mark registry that
//! tracks what's currently watched — lives here as one unit with one
//! lifetime, so there's a single place that can assert "both descriptors
//! are open and the root is marked" rather than scattering that invariant
//! across the loop.

use std::fs;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use log::{debug, warn};

use crate::event::{Event, Origin, Severity};
use crate::fd_guard::FdGuard;
use crate::marks::{self, MarkSet};
use crate::sys;

/// Failure opening a watch. Every variant names the syscall that failed;
/// whatever descriptors had already been created close themselves via
/// `FdGuard`'s `Drop` before this ever reaches a caller.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// `fanotify_init` itself failed, most often `EPERM` (missing
    /// `CAP_SYS_ADMIN`) or `EMFILE`/`ENFILE`.
    #[error("fanotify_init failed: {0}")]
    FanotifyInit(#[source] io::Error),

    /// Every directory in the subtree failed to mark, including the root.
    #[error("no directory under the watch root could be marked")]
    NoMarks,

    /// Creating the epoll instance failed.
    #[error("epoll_create1 failed: {0}")]
    EpollCreate(#[source] io::Error),

    /// Registering the fanotify descriptor with epoll failed.
    #[error("epoll_ctl failed: {0}")]
    EpollCtl(#[source] io::Error),
}

/// The open descriptors and bookkeeping a live watch needs for its
/// lifetime. Produced by [`open`], consumed by [`Resources::close`].
pub struct Resources {
    /// The fanotify group descriptor.
    pub watch_fd: FdGuard,
    /// The epoll instance `watch_fd` is registered with.
    pub event_fd: FdGuard,
    /// What we believe is currently marked.
    pub marks: MarkSet,
}

/// Marks `root` and, recursively, every directory beneath it (following
/// directory symlinks), reporting a warning diagnostic through `callback`
/// for each individual directory that couldn't be marked. Permission
/// errors walking the tree are swallowed; a partially-seeded registry is
/// acceptable, an empty one is not (checked by the caller).
fn seed_marks<F: FnMut(Event)>(root: &Path, watch_fd: RawFd, marks: &mut MarkSet, callback: &mut F) {
    let mut not_watched = |child: &Path| {
        callback(Event::diagnostic(
            Severity::Warning,
            Origin::Sys,
            "not_watched",
            None,
            Some(root),
            Some(child),
        ));
    };

    if !marks::mark(root, watch_fd, marks) {
        not_watched(root);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let path = entry.path();
            // `metadata` (not `symlink_metadata`) so a symlink to a
            // directory is walked like a directory.
            let is_dir = match fs::metadata(&path) {
                Ok(meta) => meta.is_dir(),
                Err(_) => continue,
            };
            if !is_dir {
                continue;
            }
            if !marks::mark(&path, watch_fd, marks) {
                not_watched(&path);
            }
            stack.push(path);
        }
    }
}

/// Opens a fanotify group scoped to `root`, seeds the mark registry, and
/// registers the group with a fresh epoll instance.
///
/// `callback` receives a diagnostic for every individual mark failure
/// encountered while seeding the registry, in addition to whatever
/// diagnostic corresponds to the `OpenError` this returns.
pub fn open<F: FnMut(Event)>(root: &Path, callback: &mut F) -> Result<Resources, OpenError> {
    let init_flags =
        sys::FAN_CLASS_NOTIF | sys::FAN_REPORT_DFID_NAME | sys::FAN_UNLIMITED_QUEUE | sys::FAN_UNLIMITED_MARKS;
    let event_f_flags = (sys::O_RDONLY | sys::O_NONBLOCK | sys::O_CLOEXEC) as libc::c_uint;

    let raw_watch_fd = unsafe { sys::fanotify_init(init_flags, event_f_flags) };
    if raw_watch_fd < 0 {
        let err = io::Error::last_os_error();
        callback(Event::diagnostic(
            Severity::Error,
            Origin::Sys,
            "fanotify_init",
            Some(&err),
            None,
            None,
        ));
        return Err(OpenError::FanotifyInit(err));
    }
    let watch_fd = unsafe { FdGuard::from_raw(raw_watch_fd) };

    let mut marks = MarkSet::with_capacity(marks::RESERVE_HINT);
    seed_marks(root, watch_fd.as_raw(), &mut marks, callback);
    if marks.is_empty() {
        callback(Event::diagnostic(
            Severity::Error,
            Origin::Sys,
            "fanotify_mark",
            None,
            Some(root),
            None,
        ));
        return Err(OpenError::NoMarks);
    }

    let raw_event_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
    if raw_event_fd < 0 {
        let err = io::Error::last_os_error();
        callback(Event::diagnostic(
            Severity::Error,
            Origin::Sys,
            "epoll_create",
            Some(&err),
            None,
            None,
        ));
        return Err(OpenError::EpollCreate(err));
    }
    let event_fd = unsafe { FdGuard::from_raw(raw_event_fd) };

    let mut registration = libc::epoll_event {
        events: libc::EPOLLIN as u32,
        u64: watch_fd.as_raw() as u64,
    };
    let rc = unsafe {
        libc::epoll_ctl(
            event_fd.as_raw_fd(),
            libc::EPOLL_CTL_ADD,
            watch_fd.as_raw_fd(),
            &mut registration,
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        callback(Event::diagnostic(
            Severity::Error,
            Origin::Sys,
            "epoll_ctl",
            Some(&err),
            None,
            None,
        ));
        return Err(OpenError::EpollCtl(err));
    }

    debug!("opened fanotify resource bundle with {} initial mark(s)", marks.len());
    Ok(Resources { watch_fd, event_fd, marks })
}

impl Resources {
    /// Closes both descriptors, consuming the bundle. Returns whether both
    /// closed cleanly; a failure on one side still attempts the other.
    pub fn close(self) -> bool {
        let watch_closed = self.watch_fd.close().is_ok();
        let event_closed = self.event_fd.close().is_ok();
        if !watch_closed || !event_closed {
            warn!("fanotify resource bundle did not close cleanly");
        } else {
            debug!("closed fanotify resource bundle");
        }
        watch_closed && event_closed
    }
}
