//! The boundary types this backend hands to a caller's callback.
//!
//! These are deliberately narrow: just enough to describe "what changed,
//! how, and what kind of thing it was" plus an in-band channel for
//! diagnostics. A caller wiring several backends together behind one
//! dispatcher would typically own a richer `Event` and translate into it;
//! this crate doesn't assume that dispatcher exists.

use std::path::PathBuf;

/// What kind of change a [`PathKind::File`] or [`PathKind::Directory`] event
/// describes.
///
/// `Other` covers attribute changes and anything else the kernel reports
/// that doesn't fit the four named effects; it is also the effect carried by
/// every diagnostic event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EffectKind {
    /// The path was created.
    Create,
    /// The path was deleted.
    Destroy,
    /// The path's contents were modified.
    Modify,
    /// The path was renamed or moved.
    Rename,
    /// Anything else the kernel reports, and every diagnostic event.
    Other,
}

/// What kind of filesystem object (or non-object) an event's path refers
/// to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PathKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A self-diagnostic, not a filesystem change. See [`Event::diagnostic`].
    Watcher,
}

/// A single hydrated filesystem event, or a diagnostic.
///
/// Diagnostics and real changes share this type and travel through the same
/// callback, distinguished by `kind == PathKind::Watcher`. See
/// [`Event::diagnostic`] for the tag grammar used in that case.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Event {
    /// The affected path, or a diagnostic tag when `kind == PathKind::Watcher`.
    pub path: PathBuf,
    /// What kind of change this was.
    pub effect: EffectKind,
    /// What kind of filesystem object `path` refers to.
    pub kind: PathKind,
}

/// Severity of a diagnostic tag. Every tag begins with one of these.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Severity {
    /// The watch cannot continue; the event loop will return `false` within
    /// one more tick of emitting this.
    Error,
    /// The watch continues; something unexpected happened but was handled.
    Warning,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Error => "e",
            Severity::Warning => "w",
        }
    }
}

/// Where a diagnostic originated: a kernel/libc call (`sys`), or this
/// crate's own logic (`self`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Origin {
    /// A kernel or libc call failed or reported something unusual.
    Sys,
    /// This crate's own logic raised the diagnostic.
    SelfOrigin,
}

impl Origin {
    fn tag(self) -> &'static str {
        match self {
            Origin::Sys => "sys",
            Origin::SelfOrigin => "self",
        }
    }
}

impl Event {
    /// Builds a diagnostic event: `path_kind = Watcher`, `effect = Other`,
    /// and `path` holding a tag of the form
    /// `<severity>/<origin>/<symbol>[@<base>[@<child>]]`.
    ///
    /// `errno` is appended as `(<errno-string>)` after `symbol` when given,
    /// matching the grammar in the crate's top-level documentation.
    pub fn diagnostic(
        severity: Severity,
        origin: Origin,
        symbol: &str,
        errno: Option<&std::io::Error>,
        base: Option<&std::path::Path>,
        child: Option<&std::path::Path>,
    ) -> Event {
        let mut tag = format!("{}/{}/{}", severity.tag(), origin.tag(), symbol);
        if let Some(errno) = errno {
            tag.push_str(&format!("({})", errno));
        }
        if let Some(base) = base {
            tag.push('@');
            tag.push_str(&base.to_string_lossy());
        }
        if let Some(child) = child {
            tag.push('@');
            tag.push_str(&child.to_string_lossy());
        }

        Event {
            path: PathBuf::from(tag),
            effect: EffectKind::Other,
            kind: PathKind::Watcher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn diagnostic_tag_grammar() {
        let event = Event::diagnostic(
            Severity::Warning,
            Origin::Sys,
            "not_watched",
            None,
            Some(Path::new("/tmp/w2")),
            Some(Path::new("/tmp/w2/d")),
        );
        assert_eq!(event.kind, PathKind::Watcher);
        assert_eq!(event.effect, EffectKind::Other);
        assert_eq!(event.path.to_str().unwrap(), "w/sys/not_watched@/tmp/w2@/tmp/w2/d");
    }

    #[test]
    fn diagnostic_every_tag_starts_with_severity() {
        for severity in [Severity::Error, Severity::Warning] {
            let event = Event::diagnostic(severity, Origin::Sys, "read", None, None, None);
            let tag = event.path.to_str().unwrap();
            assert!(tag.starts_with("e/") || tag.starts_with("w/"));
        }
    }

    #[test]
    fn diagnostic_appends_errno_suffix() {
        let err = std::io::Error::from_raw_os_error(libc::EMFILE);
        let event = Event::diagnostic(Severity::Error, Origin::Sys, "fanotify_init", Some(&err), None, None);
        let tag = event.path.to_str().unwrap();
        assert!(tag.starts_with("e/sys/fanotify_init("));
        assert!(tag.ends_with(')'));
    }
}
