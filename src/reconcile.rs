//! Keeping the mark set in step with the live directory shape.
//!
//! A newly created directory isn't watched until we explicitly mark it —
//! `fanotify` doesn't watch subtrees recursively on its own, it only
//! watches what it's told to. The reconciler is the piece that notices
//! "a directory just appeared" or "a directory just vanished" in the
//! already-promoted event stream and issues the matching mark/unmark.

use std::os::unix::io::RawFd;

use crate::event::{EffectKind, PathKind};
use crate::marks::{self, MarkSet};
use crate::promote::Promoted;

/// Applies the structural consequence (if any) of a promoted event to the
/// mark registry, and returns whether the event is still usable.
///
/// Hydration that produced no path at all (`Hydration::Invalid`) never
/// reaches the registry. A directory creation that fails to mark, or a
/// destruction that fails to unmark, downgrades the event to unusable: a
/// caller can't trust the watch set to keep reporting on a path it just
/// failed to register or release. Every other combination passes the
/// incoming success straight through.
pub fn reconcile(promoted: &Promoted, watch_fd: RawFd, marks: &mut MarkSet) -> bool {
    let path = match promoted.hydration.ok_path() {
        Some(path) => path,
        None => return false,
    };

    match (promoted.kind, promoted.effect) {
        (PathKind::Directory, EffectKind::Create) => marks::mark(&path, watch_fd, marks),
        (PathKind::Directory, EffectKind::Destroy) => marks::unmark(&path, watch_fd, marks),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promote::Hydration;
    use std::path::PathBuf;

    fn promoted(kind: PathKind, effect: EffectKind, hydration: Hydration) -> Promoted {
        Promoted { effect, kind, hydration }
    }

    #[test]
    fn invalid_hydration_never_reconciles() {
        let mut marks = MarkSet::new();
        let p = promoted(PathKind::Directory, EffectKind::Create, Hydration::Invalid);
        assert!(!reconcile(&p, -1, &mut marks));
        assert!(marks.is_empty());
    }

    #[test]
    fn file_events_pass_through_untouched() {
        let mut marks = MarkSet::new();
        let p = promoted(
            PathKind::File,
            EffectKind::Modify,
            Hydration::Full(PathBuf::from("/tmp/w/f")),
        );
        assert!(reconcile(&p, -1, &mut marks));
        assert!(marks.is_empty());
    }

    #[test]
    fn directory_other_effect_passes_through_without_marking() {
        let mut marks = MarkSet::new();
        let p = promoted(
            PathKind::Directory,
            EffectKind::Modify,
            Hydration::Full(PathBuf::from("/tmp/w/d")),
        );
        assert!(reconcile(&p, -1, &mut marks));
        assert!(marks.is_empty());
    }

    #[test]
    fn name_only_hydration_still_attempts_the_mark() {
        // No directory prefix could be recovered, but a name-only hydration
        // is still usable; it's the mark/unmark syscall itself (here run
        // against an invalid fd) that decides success.
        let mut marks = MarkSet::new();
        let p = promoted(
            PathKind::Directory,
            EffectKind::Create,
            Hydration::NameOnly("d".into()),
        );
        assert!(!reconcile(&p, -1, &mut marks));
        assert!(marks.is_empty());
    }
}
