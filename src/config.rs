//! The handful of tunables the event loop needs, broken out of the
//! constants they'd otherwise be so tests can shrink them.

/// Tunables for [`crate::watch_with_config`].
///
/// The `Default` impl matches the constants this backend is specified
/// against; production callers should rarely need anything else.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Milliseconds `epoll_wait` blocks for before the event loop re-checks
    /// the liveness flag. Bounds shutdown latency; does not cause busy
    /// spinning because the wait itself blocks.
    pub delay_ms: i32,

    /// Maximum number of ready entries requested from `epoll_wait` per
    /// iteration. There is only ever one descriptor registered (the
    /// fanotify group), so this rarely needs to exceed 1.
    pub event_wait_queue_max: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            delay_ms: 16,
            event_wait_queue_max: 1,
        }
    }
}
