//! The mark registry: a record of which directories we've asked the kernel
//! to watch.
//!
//! `fanotify_mark` doesn't hand back a per-path watch descriptor the way
//! some other inode-notification APIs do — it returns `0` on success and
//! `-1` on failure. The registry is therefore not a map from path to a
//! unique kernel id; it's the raw success-codes the kernel has given us,
//! deduplicated (every successful mark tends to collapse to the same `0`).
//! Weaker than it looks, but it's the truth of what the syscall reports.

use std::collections::HashSet;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;

use log::debug;

use crate::sys;

/// A kernel mark identifier, as returned by `fanotify_mark`. See the module
/// doc for why this is a much weaker guarantee than it sounds.
pub type MarkId = i32;

/// The set of mark identifiers currently believed to be registered with the
/// kernel.
pub type MarkSet = HashSet<MarkId>;

const MARK_MASK: u64 = sys::FAN_ONDIR
    | sys::FAN_CREATE
    | sys::FAN_MODIFY
    | sys::FAN_DELETE
    | sys::FAN_MOVE
    | sys::FAN_DELETE_SELF
    | sys::FAN_MOVE_SELF;

/// A starting-capacity hint for a fresh registry. Not a hard bound: the
/// kernel's `FAN_UNLIMITED_MARKS` flag is what actually removes the limit.
pub const RESERVE_HINT: usize = 1024;

fn mark_raw(path: &Path, watch_fd: RawFd, action: u32) -> io::Result<MarkId> {
    let c_path = CString::new(path.as_os_str().as_bytes())?;
    let id = unsafe {
        sys::fanotify_mark(
            watch_fd,
            action,
            MARK_MASK,
            sys::AT_FDCWD,
            c_path.as_ptr(),
        )
    };
    if id >= 0 {
        Ok(id)
    } else {
        Err(io::Error::last_os_error())
    }
}

fn apply_mark(id: MarkId, marks: &mut MarkSet) -> bool {
    marks.insert(id);
    true
}

fn apply_unmark(id: MarkId, marks: &mut MarkSet) -> bool {
    marks.remove(&id)
}

/// Requests a directory-scoped mark on `path`, for the fixed event mask
/// this backend always uses. Inserts the kernel's returned id into `marks`
/// on success; leaves `marks` untouched on failure.
pub fn mark(path: &Path, watch_fd: RawFd, marks: &mut MarkSet) -> bool {
    let ok = match mark_raw(path, watch_fd, sys::FAN_MARK_ADD) {
        Ok(id) => apply_mark(id, marks),
        Err(_) => false,
    };
    debug!("mark {}: {}", path.display(), ok);
    ok
}

/// Issues the matching mark removal. Only reports success if the id the
/// kernel returned was present in `marks`.
pub fn unmark(path: &Path, watch_fd: RawFd, marks: &mut MarkSet) -> bool {
    let ok = match mark_raw(path, watch_fd, sys::FAN_MARK_REMOVE) {
        Ok(id) => apply_unmark(id, marks),
        Err(_) => false,
    };
    debug!("unmark {}: {}", path.display(), ok);
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_mark_inserts_id() {
        let mut marks = MarkSet::new();
        assert!(apply_mark(0, &mut marks));
        assert!(marks.contains(&0));
    }

    #[test]
    fn apply_unmark_removes_known_id_only() {
        let mut marks = MarkSet::new();
        marks.insert(0);
        assert!(!apply_unmark(7, &mut marks));
        assert!(apply_unmark(0, &mut marks));
        assert!(marks.is_empty());
    }

    #[test]
    fn repeated_marks_collapse_to_shared_ids() {
        // fanotify_mark returns 0 on every success; this is the inherited
        // quirk the module doc describes.
        let mut marks = MarkSet::new();
        apply_mark(0, &mut marks);
        apply_mark(0, &mut marks);
        apply_mark(0, &mut marks);
        assert_eq!(marks.len(), 1);
    }
}
