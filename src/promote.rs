//! Turning a raw [`Record`] into a hydrated path.
//!
//! A record only carries a directory file handle and (usually) a child
//! name; nothing here is already a `Path`. Promotion is the process of
//! resolving the handle back into an absolute directory path via
//! `open_by_handle_at` + `readlink("/proc/self/fd/<n>")`, then joining the
//! child name onto it.
//!
//! Either half of that can fail independently of the other, which is why
//! the result is the three-way [`Hydration`] rather than an `Option<PathBuf>`:
//! losing the directory path while still holding a name is a different,
//! more useful failure than losing everything.

use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::event::{EffectKind, Event, PathKind};
use crate::fd_guard::FdGuard;
use crate::record::Record;
use crate::sys;

/// The outcome of resolving a record's directory handle and child name
/// into something path-shaped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Hydration {
    /// The directory resolved and a name was present (or the event was
    /// about the directory itself): a complete, absolute path.
    Full(PathBuf),
    /// The directory handle didn't resolve, but a child name was present.
    /// Better than nothing for a caller that only logs names.
    NameOnly(OsString),
    /// Neither resolved, or the record wasn't shaped the way this backend
    /// expects.
    Invalid,
}

impl Hydration {
    /// The best available path, for anything downstream that only needs
    /// "something path-shaped", not a guarantee of absoluteness. `None`
    /// only for [`Hydration::Invalid`].
    pub fn ok_path(&self) -> Option<PathBuf> {
        match self {
            Hydration::Full(path) => Some(path.clone()),
            Hydration::NameOnly(name) => Some(PathBuf::from(name)),
            Hydration::Invalid => None,
        }
    }
}

/// A record's classification plus its hydrated path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Promoted {
    /// What kind of change this was.
    pub effect: EffectKind,
    /// Whether the changed path is a file or a directory.
    pub kind: PathKind,
    /// The resolved (or partially resolved) path.
    pub hydration: Hydration,
}

impl Promoted {
    /// Converts to the event a caller's callback receives, or `None` if
    /// hydration failed outright (nothing path-shaped survived).
    pub fn into_event(self) -> Option<Event> {
        let path = self.hydration.ok_path()?;
        Some(Event { path, effect: self.effect, kind: self.kind })
    }
}

fn effect_kind(mask: sys::FanotifyMask) -> EffectKind {
    if mask.contains(sys::FanotifyMask::CREATE) {
        EffectKind::Create
    } else if mask.contains(sys::FanotifyMask::DELETE) {
        EffectKind::Destroy
    } else if mask.contains(sys::FanotifyMask::MODIFY) {
        EffectKind::Modify
    } else if mask.intersects(sys::FanotifyMask::MOVED_FROM | sys::FanotifyMask::MOVED_TO) {
        EffectKind::Rename
    } else {
        EffectKind::Other
    }
}

fn path_kind(mask: sys::FanotifyMask) -> PathKind {
    if mask.contains(sys::FanotifyMask::ONDIR) {
        PathKind::Directory
    } else {
        PathKind::File
    }
}

/// Outcome of trying to resolve a record's directory handle back into a
/// path. Kept distinct from a plain `Option` because the two failure modes
/// are treated differently by [`promote`]: failing to even open the handle
/// still leaves the entry name usable, but failing the `readlink` after a
/// successful open means the whole record is untrustworthy.
enum DirResolution {
    Resolved(PathBuf),
    HandleUnopenable,
    ReadlinkFailed,
}

/// Resolves a record's directory handle into an absolute path, by asking
/// the kernel to open it (`O_PATH`, so no read/write rights are needed or
/// granted) and then reading back the magic symlink the kernel maintains
/// for every open descriptor.
fn resolve_dir_path(record: &Record) -> DirResolution {
    // `open_by_handle_at` wants the handle bytes contiguous with the fixed
    // `file_handle` header in memory, exactly as `record::parse_one` found
    // them in the read buffer; casting away `const` here doesn't let us
    // mutate anything the kernel cares about, since the kernel only reads.
    let flags = sys::O_RDONLY | sys::O_CLOEXEC | sys::O_PATH | sys::O_NONBLOCK;
    let handle_ptr = record.handle() as *const sys::file_handle as *mut sys::file_handle;
    let fd = unsafe { sys::open_by_handle_at(sys::AT_FDCWD, handle_ptr, flags) };
    if fd < 0 {
        return DirResolution::HandleUnopenable;
    }
    let guard = unsafe { FdGuard::from_raw(fd) };

    let proc_path = format!("/proc/self/fd/{}", guard.as_raw());
    let result = CString::new(proc_path).ok().and_then(|c_proc_path| {
        let mut buf = [0u8; libc::PATH_MAX as usize];
        let n = unsafe {
            sys::readlink(c_proc_path.as_ptr(), buf.as_mut_ptr() as *mut libc::c_char, buf.len())
        };
        if n < 0 {
            None
        } else {
            Some(PathBuf::from(OsStr::from_bytes(&buf[..n as usize])))
        }
    });
    let _ = guard.close();

    match result {
        Some(path) => DirResolution::Resolved(path),
        None => DirResolution::ReadlinkFailed,
    }
}

fn truncate_to_path_max(path: PathBuf) -> PathBuf {
    let max = libc::PATH_MAX as usize;
    let bytes = path.as_os_str().as_bytes();
    if bytes.len() <= max {
        path
    } else {
        PathBuf::from(OsStr::from_bytes(&bytes[..max]))
    }
}

/// Promotes one record into its classification and hydrated path.
///
/// Callers are expected to have already checked `record.info_type()` is
/// `FAN_EVENT_INFO_TYPE_DFID_NAME`; this function doesn't re-check it, since
/// the drain loop's classification table handles unsupported info types
/// before a record ever reaches here.
pub fn promote(record: &Record) -> Promoted {
    let mask = sys::FanotifyMask::from_bits_truncate(record.mask());
    let effect = effect_kind(mask);
    let kind = path_kind(mask);

    // "." means the event is about the watched directory itself, not a
    // child; treat it the same as no name.
    let name = match record.name() {
        b"." => &[],
        other => other,
    };

    let hydration = match (resolve_dir_path(record), name.is_empty()) {
        (DirResolution::Resolved(base), true) => Hydration::Full(truncate_to_path_max(base)),
        (DirResolution::Resolved(base), false) => {
            Hydration::Full(truncate_to_path_max(base.join(OsStr::from_bytes(name))))
        }
        (DirResolution::HandleUnopenable, false) => {
            Hydration::NameOnly(OsStr::from_bytes(name).to_os_string())
        }
        (DirResolution::HandleUnopenable, true) => Hydration::Invalid,
        (DirResolution::ReadlinkFailed, _) => Hydration::Invalid,
    };

    Promoted { effect, kind, hydration }
}
