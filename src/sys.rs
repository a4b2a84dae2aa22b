//! Raw bindings for the parts of `fanotify` and `open_by_handle_at` that
//! `libc` doesn't expose across every target triple and `libc` version this
//! crate supports.
//!
//! There are four kinds of items here, mirroring the shape of the kernel
//! headers:
//!
//! - __Flags__, passed to `fanotify_init()` and `fanotify_mark()`;
//! - __Events__, the bits of an event's mask that describe what happened;
//! - __Info types__, which distinguish the variable-length records that can
//!   follow a `fanotify_event_metadata`;
//! - __Structs__, the `#[repr(C)]` layouts the kernel writes into our
//!   buffers.
//!
//! See the [fanotify(7)] and [open_by_handle_at(2)] man pages for the
//! authoritative description of everything in this module.
//!
//! [fanotify(7)]: http://man7.org/linux/man-pages/man7/fanotify.7.html
//! [open_by_handle_at(2)]: http://man7.org/linux/man-pages/man2/open_by_handle_at.2.html

use bitflags::bitflags;
use libc::{c_char, c_int, c_uint, c_void};

/// Flag: notification class, as opposed to a permission-checking class.
///
/// We only ever open a notification group; this crate has no use for
/// `FAN_CLASS_CONTENT` or `FAN_CLASS_PRE_CONTENT`.
pub const FAN_CLASS_NOTIF: c_uint = 0x0000_0000;

/// Flag: report events with a directory file handle and name, rather than
/// an open file descriptor to the changed object.
///
/// This is the flag that makes the variable-length,
/// `fanotify_event_info_fid`-bearing record format in this module relevant.
/// Support for it requires Linux 5.9 or later.
pub const FAN_REPORT_DFID_NAME: c_uint = 0x0000_0400 | 0x0000_0800;

/// Flag: don't bound the length of the event queue.
///
/// Requires privilege; without it, the kernel silently caps the queue at a
/// few thousand entries and begins reporting `FAN_Q_OVERFLOW`.
pub const FAN_UNLIMITED_QUEUE: c_uint = 0x0000_0010;

/// Flag: don't bound the number of marks this group may hold.
pub const FAN_UNLIMITED_MARKS: c_uint = 0x0000_0020;

/// Option: open the event descriptor read-only.
pub const O_RDONLY: c_int = libc::O_RDONLY;

/// Option: open the event descriptor non-blocking.
pub const O_NONBLOCK: c_int = libc::O_NONBLOCK;

/// Option: set the close-on-exec flag on the event descriptor.
pub const O_CLOEXEC: c_int = libc::O_CLOEXEC;

/// Option: don't allow `read`/`write` on the resulting descriptor, only
/// `fstat`/`close`-like operations.
///
/// Used together with `open_by_handle_at` below, since we only want the
/// descriptor in order to `readlink` `/proc/self/fd/<n>`.
pub const O_PATH: c_int = 0o010_000_000;

/// Mark action: add a mark for the given mask.
pub const FAN_MARK_ADD: c_uint = 0x0000_0001;

/// Mark action: remove a mark for the given mask.
pub const FAN_MARK_REMOVE: c_uint = 0x0000_0002;

/// Event: subfile was created.
pub const FAN_CREATE: u64 = 0x0000_0100;

/// Event: subfile was deleted.
pub const FAN_DELETE: u64 = 0x0000_0200;

/// Event: file was modified.
pub const FAN_MODIFY: u64 = 0x0000_0002;

/// Event: subfile was moved from or to this directory.
pub const FAN_MOVE: u64 = FAN_MOVED_FROM | FAN_MOVED_TO;

/// Event: subfile was moved from this directory.
pub const FAN_MOVED_FROM: u64 = 0x0000_0040;

/// Event: subfile was moved into this directory.
pub const FAN_MOVED_TO: u64 = 0x0000_0080;

/// Event: watched directory itself was deleted.
pub const FAN_DELETE_SELF: u64 = 0x0000_0400;

/// Event: watched directory itself was moved.
pub const FAN_MOVE_SELF: u64 = 0x0000_0800;

/// Event: the marked object is a directory.
///
/// Combine with the mark mask to receive events for a whole directory
/// subtree rather than the directory inode alone.
pub const FAN_ONDIR: u64 = 0x4000_0000;

/// Event: the event queue overflowed and some events were dropped.
pub const FAN_Q_OVERFLOW: u64 = 0x0000_4000;

/// Sentinel `fd` value: this event carries no open file descriptor.
///
/// Reported in place of a real descriptor for queue-overflow notifications
/// on groups that aren't monitoring by file handle; this backend always
/// monitors by file handle, so any event carrying a real `fd` here indicates
/// an unexpected record shape.
pub const FAN_NOFD: c_int = -1;

/// The metadata version this crate was built against.
///
/// An event whose `vers` field disagrees indicates the running kernel's
/// `fanotify` ABI has drifted from what this crate expects.
pub const FANOTIFY_METADATA_VERSION: u8 = 3;

/// Info-record type: directory file handle plus the entry's name.
///
/// This is the only info-record type this backend is prepared to parse; any
/// other type observed in a live record is treated as a warning (§7 of the
/// design).
pub const FAN_EVENT_INFO_TYPE_DFID_NAME: u8 = 2;

bitflags! {
    /// The event mask as a typed set of flags, rather than a bare `u64`.
    ///
    /// Built from the same `FAN_*` constants `fanotify_mark` takes, so
    /// asking a live record "does this contain `Q_OVERFLOW`" reads the same
    /// way as building the mark mask did.
    pub struct FanotifyMask: u64 {
        const CREATE = FAN_CREATE;
        const DELETE = FAN_DELETE;
        const MODIFY = FAN_MODIFY;
        const MOVED_FROM = FAN_MOVED_FROM;
        const MOVED_TO = FAN_MOVED_TO;
        const DELETE_SELF = FAN_DELETE_SELF;
        const MOVE_SELF = FAN_MOVE_SELF;
        const ONDIR = FAN_ONDIR;
        const Q_OVERFLOW = FAN_Q_OVERFLOW;
    }
}

/// One event as placed in the buffer returned by `read()` on a fanotify
/// file descriptor.
///
/// Variable-length: `event_len` gives the total size of this event,
/// including any trailing info records, and must be used to step to the
/// next event rather than `size_of::<fanotify_event_metadata>()`.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct fanotify_event_metadata {
    /// Total length of this event, including any trailing info records.
    pub event_len: u32,
    /// The metadata version. Compare against `FANOTIFY_METADATA_VERSION`.
    pub vers: u8,
    /// Unused padding byte; reserved by the kernel for future use.
    pub reserved: u8,
    /// Length of this fixed portion of the structure.
    pub metadata_len: u16,
    /// Bitmask describing what happened. See the `FAN_*` event constants.
    pub mask: u64,
    /// An open file descriptor for the changed object, or `FAN_NOFD`.
    pub fd: c_int,
    /// PID of the process that caused the event.
    pub pid: c_int,
}

/// Header shared by every kind of trailing info record.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct fanotify_event_info_header {
    /// Discriminates the kind of record that follows. See
    /// `FAN_EVENT_INFO_TYPE_*`.
    pub info_type: u8,
    /// Unused padding byte.
    pub pad: u8,
    /// Length of this record, including the header.
    pub len: u16,
}

/// An opaque filesystem id, as returned alongside a file handle.
///
/// This crate never inspects the value; it exists only so the layout of
/// `fanotify_event_info_fid` matches the kernel's.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct kernel_fsid_t {
    /// The opaque filesystem id, as two 32-bit words.
    pub val: [c_int; 2],
}

/// An info record reporting a directory file handle, immediately followed
/// in memory by the `file_handle`'s bytes, and then (for
/// `FAN_EVENT_INFO_TYPE_DFID_NAME`) a NUL-terminated entry name.
///
/// This struct only describes the fixed prefix; callers walk past it
/// manually, as the kernel does not give file handles a fixed size.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct fanotify_event_info_fid {
    /// The shared info-record header.
    pub hdr: fanotify_event_info_header,
    /// The filesystem the handle belongs to.
    pub fsid: kernel_fsid_t,
    // `unsigned char handle[0]` in the kernel header: the file_handle bytes
    // begin immediately after this struct, with no padding.
}

/// A kernel file handle, opaque and filesystem-stable, resolvable back into
/// a descriptor via `open_by_handle_at`.
///
/// Like `fanotify_event_info_fid`, the variable-length `f_handle` bytes
/// begin immediately after this struct; `handle_bytes` gives their count.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct file_handle {
    /// The number of opaque bytes following this struct.
    pub handle_bytes: c_uint,
    /// Filesystem-specific handle type, opaque to this crate.
    pub handle_type: c_int,
}

extern "C" {
    /// Creates a new fanotify notification group, returning a file
    /// descriptor that refers to it.
    ///
    /// `flags` controls the notification class and reporting format (in
    /// particular whether file handles or open descriptors are reported);
    /// `event_f_flags` controls the flags used to open the file descriptors
    /// fanotify hands back (ignored entirely when handles are reported
    /// instead, as they are here).
    pub fn fanotify_init(flags: c_uint, event_f_flags: c_uint) -> c_int;

    /// Adds, removes, or modifies a mark on a filesystem object within the
    /// fanotify group referred to by `fanotify_fd`.
    ///
    /// `dirfd` and `pathname` together name the object exactly as they
    /// would for `openat(2)`; this crate always passes `AT_FDCWD` and an
    /// absolute path.
    pub fn fanotify_mark(
        fanotify_fd: c_int,
        flags: c_uint,
        mask: u64,
        dirfd: c_int,
        pathname: *const c_char,
    ) -> c_int;

    /// Converts a file handle, as received in a `fanotify_event_info_fid`,
    /// back into an open file descriptor.
    ///
    /// `mount_fd` is a descriptor for any object on the same mount as the
    /// handle, or `AT_FDCWD` to have the kernel search all mounts the
    /// caller has visibility into.
    pub fn open_by_handle_at(
        mount_fd: c_int,
        handle: *mut file_handle,
        flags: c_int,
    ) -> c_int;
}

/// Equivalent of `AT_FDCWD`: resolve `pathname`/`handle` without reference
/// to any particular open directory descriptor.
pub const AT_FDCWD: c_int = -100;

/// Thin wrapper over `libc::read`, kept here so every raw syscall this
/// backend depends on is visible in one module.
pub unsafe fn read(fd: c_int, buf: *mut c_void, count: usize) -> isize {
    libc::read(fd, buf, count)
}

/// Thin wrapper over `libc::close`.
pub unsafe fn close(fd: c_int) -> c_int {
    libc::close(fd)
}

/// Thin wrapper over `libc::readlink`.
pub unsafe fn readlink(path: *const c_char, buf: *mut c_char, bufsiz: usize) -> isize {
    libc::readlink(path, buf, bufsiz)
}
