#![crate_name = "fanotify_watcher"]
#![crate_type = "lib"]
#![deny(missing_docs)]

//! A Linux filesystem-change watcher built on `fanotify`'s handle-and-name
//! reporting mode.
//!
//! # About
//!
//! This crate watches a directory subtree for creates, deletes, modifies,
//! and renames, using the `FAN_REPORT_DFID_NAME` mode introduced in Linux
//! 5.9: events carry a directory file handle plus the changed entry's name,
//! rather than an open file descriptor. [`watch`] resolves each handle back
//! into an absolute path, keeps the mark set in step with directories as
//! they're created and destroyed, and delivers everything — real changes
//! and this crate's own diagnostics alike — through one callback.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use fanotify_watcher::{watch, PathKind};
//!
//! let is_running = AtomicBool::new(true);
//! watch("/tmp/some-directory", |event| {
//!     if event.kind != PathKind::Watcher {
//!         println!("{:?} {:?} {:?}", event.path, event.effect, event.kind);
//!     }
//! }, &is_running);
//! ```
//!
//! # Diagnostics
//!
//! Backend errors and warnings travel through the same callback as real
//! events, tagged `path_kind = Watcher` and a `path` of the form
//! `"<severity>/<origin>/<symbol>[(<errno>)][@<base>][@<child>]"`, e.g.
//! `"w/sys/not_watched@/tmp/w@/tmp/w/locked"`. Every diagnostic is also
//! logged through the [`log`] facade at a matching level, for callers who'd
//! rather consume it through their existing logging pipeline.
//!
//! # Privilege
//!
//! Opening an unbounded fanotify group (`FAN_UNLIMITED_QUEUE`,
//! `FAN_UNLIMITED_MARKS`) requires `CAP_SYS_ADMIN` on kernels before 5.13,
//! and the unprivileged listener mode on 5.13 and later still limits what
//! can be watched. [`watch`] surfaces any such failure as an
//! `"e/self/sys_resource"` diagnostic rather than panicking.

mod config;
mod drain;
mod event;
mod fd_guard;
mod marks;
mod promote;
mod reconcile;
mod record;
mod resources;
mod sys;
mod watch;

pub use config::Config;
pub use event::{EffectKind, Event, PathKind};
pub use resources::OpenError;
pub use watch::{watch, watch_with_config};
