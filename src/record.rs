//! Walking the variable-length buffer `read()` fills with fanotify events.
//!
//! The kernel gives us validity and next-record macros (`FAN_EVENT_OK`,
//! `FAN_EVENT_NEXT`) rather than a real iterator; this module is that
//! iterator, built once so the drain loop (`crate::drain`) never touches a
//! raw pointer itself.

use std::mem;
use std::os::raw::c_int;

use crate::sys::{
    fanotify_event_info_fid, fanotify_event_metadata, file_handle, FANOTIFY_METADATA_VERSION,
};

const METADATA_SIZE: usize = mem::size_of::<fanotify_event_metadata>();
const INFO_FID_FIXED_SIZE: usize = mem::size_of::<fanotify_event_info_fid>();
const FILE_HANDLE_FIXED_SIZE: usize = mem::size_of::<file_handle>();

/// A typed view over one event in the buffer.
///
/// Borrows from the buffer it was parsed out of; none of its accessors
/// copy, except [`Record::name`] and [`Record::handle_bytes`], which hand
/// back borrowed slices too.
#[derive(Debug)]
pub struct Record<'a> {
    meta: &'a fanotify_event_metadata,
    info_type: u8,
    handle: &'a file_handle,
    handle_bytes: &'a [u8],
    name: &'a [u8],
}

impl<'a> Record<'a> {
    /// The `vers` field; compare against [`FANOTIFY_METADATA_VERSION`].
    pub fn version(&self) -> u8 {
        self.meta.vers
    }

    /// Whether `version()` matches the version this backend was built
    /// against.
    pub fn version_matches(&self) -> bool {
        self.meta.vers == FANOTIFY_METADATA_VERSION
    }

    /// The event mask: which of `FAN_CREATE`, `FAN_DELETE`, ... fired.
    pub fn mask(&self) -> u64 {
        self.meta.mask
    }

    /// The embedded file descriptor, or `FAN_NOFD` if none was reported
    /// (which this backend always expects, since it reports by handle).
    pub fn fd(&self) -> c_int {
        self.meta.fd
    }

    /// The discriminator of the trailing info record. This backend only
    /// knows how to promote `FAN_EVENT_INFO_TYPE_DFID_NAME`.
    pub fn info_type(&self) -> u8 {
        self.info_type
    }

    /// The directory file handle, suitable for `open_by_handle_at`.
    pub fn handle(&self) -> &'a file_handle {
        self.handle
    }

    /// The handle's opaque bytes, of length `handle.handle_bytes`.
    pub fn handle_bytes(&self) -> &'a [u8] {
        self.handle_bytes
    }

    /// The trailing directory-entry name, without its terminating NUL.
    /// Empty if the record carried none.
    pub fn name(&self) -> &'a [u8] {
        self.name
    }
}

fn parse_one<'a>(event: &'a [u8]) -> Option<Record<'a>> {
    if event.len() < METADATA_SIZE {
        return None;
    }
    let meta: &fanotify_event_metadata = unsafe { &*(event.as_ptr() as *const fanotify_event_metadata) };

    let info_slice = event.get(METADATA_SIZE..)?;
    if info_slice.len() < INFO_FID_FIXED_SIZE {
        return Some(Record {
            meta,
            info_type: 0,
            handle: unsafe { &*(info_slice.as_ptr() as *const file_handle) },
            handle_bytes: &[],
            name: &[],
        });
    }
    let fid: &fanotify_event_info_fid =
        unsafe { &*(info_slice.as_ptr() as *const fanotify_event_info_fid) };
    let info_type = fid.hdr.info_type;

    let handle_slice = info_slice.get(INFO_FID_FIXED_SIZE..)?;
    if handle_slice.len() < FILE_HANDLE_FIXED_SIZE {
        return None;
    }
    let handle: &file_handle = unsafe { &*(handle_slice.as_ptr() as *const file_handle) };

    let opaque_len = handle.handle_bytes as usize;
    let opaque = handle_slice.get(FILE_HANDLE_FIXED_SIZE..FILE_HANDLE_FIXED_SIZE + opaque_len)?;

    let name_start = FILE_HANDLE_FIXED_SIZE + opaque_len;
    let name_bytes = handle_slice.get(name_start..).unwrap_or(&[]);
    let nul_at = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());

    Some(Record {
        meta,
        info_type,
        handle,
        handle_bytes: opaque,
        name: &name_bytes[..nul_at],
    })
}

/// Iterates over the events in a buffer returned by `read()` on a fanotify
/// descriptor.
///
/// Mirrors `FAN_EVENT_OK`/`FAN_EVENT_NEXT`: each step trusts
/// `fanotify_event_metadata::event_len` to find the next event, and stops
/// as soon as a record doesn't fit in what's left of the buffer.
pub struct RecordIter<'a> {
    buf: &'a [u8],
}

impl<'a> RecordIter<'a> {
    /// Wraps a buffer freshly filled by `read()` on a fanotify descriptor.
    pub fn new(buf: &'a [u8]) -> Self {
        RecordIter { buf }
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.len() < METADATA_SIZE {
            return None;
        }
        let meta: &fanotify_event_metadata =
            unsafe { &*(self.buf.as_ptr() as *const fanotify_event_metadata) };
        let event_len = meta.event_len as usize;
        if event_len < METADATA_SIZE || event_len > self.buf.len() {
            return None;
        }

        let event = &self.buf[..event_len];
        self.buf = &self.buf[event_len..];
        parse_one(event)
    }
}
