//! Draining one `read()` worth of events from the fanotify descriptor.

use std::io;
use std::mem;
use std::os::raw::c_void;
use std::path::Path;

use log::{debug, trace, warn};

use crate::event::{Event, Origin, Severity};
use crate::promote::promote;
use crate::reconcile::reconcile;
use crate::record::RecordIter;
use crate::resources::Resources;
use crate::sys;

/// `read()` into a buffer large enough for a deep record, 8-byte aligned so
/// it can be reinterpreted as `fanotify_event_metadata` without UB.
#[repr(align(8))]
struct AlignedBuf([u8; libc::PATH_MAX as usize]);

/// Per-tick sentinel against a corrupted or hostile `event_len` chain
/// driving the record walk past a sane number of iterations.
fn record_count_limit(buf_len: usize) -> usize {
    buf_len / mem::size_of::<sys::fanotify_event_metadata>()
}

/// Drains every record the kernel has queued as of one `read()` call.
///
/// Returns `true` if the caller's event loop should keep running, `false`
/// on a fatal backend error (kernel ABI mismatch, or a corrupted record
/// stream).
pub fn drain<F: FnMut(Event)>(resources: &mut Resources, root: &Path, callback: &mut F) -> bool {
    let mut buf = AlignedBuf([0u8; libc::PATH_MAX as usize]);

    let n = unsafe {
        sys::read(
            resources.watch_fd.as_raw(),
            buf.0.as_mut_ptr() as *mut c_void,
            buf.0.len(),
        )
    };

    if n == 0 {
        return true;
    }
    if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            return true;
        }
        callback(Event::diagnostic(Severity::Error, Origin::Sys, "read", Some(&err), Some(root), None));
        return false;
    }

    let limit = record_count_limit(buf.0.len());
    let mut count = 0usize;

    for record in RecordIter::new(&buf.0[..n as usize]) {
        count += 1;
        trace!("record {}: mask={:#x} info_type={}", count, record.mask(), record.info_type());
        if !record.version_matches() {
            callback(Event::diagnostic(Severity::Error, Origin::Sys, "kernel_version", None, Some(root), None));
            return false;
        }

        if count > limit {
            callback(Event::diagnostic(Severity::Error, Origin::Sys, "bad_count", None, Some(root), None));
            return false;
        }

        if record.fd() != sys::FAN_NOFD {
            warn!("fanotify record carried an unexpected file descriptor: {}", record.fd());
            callback(Event::diagnostic(Severity::Warning, Origin::Sys, "bad_fd", None, Some(root), None));
            break;
        }

        let mask = sys::FanotifyMask::from_bits_truncate(record.mask());
        if mask.contains(sys::FanotifyMask::Q_OVERFLOW) {
            warn!("fanotify event queue overflowed, events were dropped");
            callback(Event::diagnostic(Severity::Warning, Origin::Sys, "overflow", None, Some(root), None));
            break;
        }

        if record.info_type() != sys::FAN_EVENT_INFO_TYPE_DFID_NAME {
            warn!("fanotify record carried an unsupported info type: {}", record.info_type());
            callback(Event::diagnostic(Severity::Warning, Origin::Sys, "bad_info", None, Some(root), None));
            break;
        }

        let promoted = promote(&record);
        let usable = reconcile(&promoted, resources.watch_fd.as_raw(), &mut resources.marks);
        if usable {
            if let Some(event) = promoted.into_event() {
                debug!("dispatching event: {:?} ({:?})", event.path, event.effect);
                callback(event);
            }
        }
    }

    true
}
