//! Which window's context is current on which thread.
//!
//! The native APIs only know "some context is current"; the host needs to know *which* one to
//! refuse buffer swaps on windows that aren't current. At most one entry exists per thread.

use crate::os::window::WindowId;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// A window's context, qualified by the host that owns the window.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub(crate) struct ContextKey {
    pub host: u64,
    pub window: WindowId,
}

thread_local! {
    static CURRENT: Cell<Option<ContextKey>> = const { Cell::new(None) };
}

static HOST_SERIAL: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_host_serial() -> u64 {
    HOST_SERIAL.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn current() -> Option<ContextKey> {
    CURRENT.with(Cell::get)
}

pub(crate) fn is_current(key: ContextKey) -> bool {
    current() == Some(key)
}

pub(crate) fn set_current(key: Option<ContextKey>) {
    CURRENT.with(|c| c.set(key));
}

/// Forget `key` if it is the current context of this thread.
pub(crate) fn clear_if_current(key: ContextKey) -> bool {
    if is_current(key) {
        set_current(None);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::window::WindowManager;

    #[test]
    fn test_one_current_context_per_thread() {
        let mut ids = WindowManager::new();
        let a = ContextKey { host: next_host_serial(), window: ids.next_id() };
        let b = ContextKey { host: a.host, window: ids.next_id() };

        set_current(Some(a));
        assert!(is_current(a));
        set_current(Some(b));
        assert!(!is_current(a));
        assert!(is_current(b));

        assert!(!clear_if_current(a));
        assert!(clear_if_current(b));
        assert_eq!(current(), None);
    }

    #[test]
    fn test_currency_is_per_thread() {
        let mut ids = WindowManager::new();
        let key = ContextKey { host: next_host_serial(), window: ids.next_id() };
        set_current(Some(key));

        let seen_elsewhere = std::thread::spawn(current).join().unwrap();
        assert_eq!(seen_elsewhere, None);
        assert!(is_current(key));
        set_current(None);
    }
}
