use crate::{Error, Result};
use std::ffi::{c_void, CStr};
use std::sync::{Mutex, PoisonError};

/// Process-wide slot for a lazily resolved entry point.
///
/// The lookup runs while the lock is held, so concurrent first callers resolve
/// once. A failed lookup leaves the slot empty and the next caller tries again.
#[derive(Debug, Default)]
pub struct SymbolCache<T: Copy> {
    slot: Mutex<Option<T>>,
}

impl<T: Copy> SymbolCache<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached value, running `resolve` first if nothing is cached yet.
    pub fn get_or_resolve<F>(&self, resolve: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = *slot {
            return Ok(value);
        }

        let value = resolve()?;
        *slot = Some(value);
        Ok(value)
    }

    #[cfg(test)]
    fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Looks `name` up in the objects loaded after this one (`RTLD_NEXT`).
pub fn resolve_next(name: &CStr) -> Result<*mut c_void> {
    // SAFETY: `name` is NUL-terminated; dlerror's message is copied before any
    // other dl* call can overwrite it.
    unsafe {
        libc::dlerror();
        let symbol = libc::dlsym(libc::RTLD_NEXT, name.as_ptr());
        if !symbol.is_null() {
            return Ok(symbol);
        }

        let message = libc::dlerror();
        let reason = if message.is_null() {
            "symbol resolved to null".to_string()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        };
        Err(Error::Resolution(format!(
            "{}: {}",
            name.to_string_lossy(),
            reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn resolves_once() {
        let cache = SymbolCache::<u32>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_resolve(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_resolved());
    }

    #[test]
    fn failure_is_retried_on_next_call() {
        let cache = SymbolCache::<u32>::new();

        let first = cache.get_or_resolve(|| Err(Error::Resolution("missing".into())));
        assert!(matches!(first, Err(Error::Resolution(_))));
        assert!(!cache.is_resolved());

        assert_eq!(cache.get_or_resolve(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn concurrent_first_use_resolves_once() {
        let cache = Arc::new(SymbolCache::<usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_resolve(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_symbol_reports_resolution_error() {
        let err = resolve_next(c"drmhook_no_such_symbol").unwrap_err();
        match err {
            Error::Resolution(message) => assert!(message.contains("drmhook_no_such_symbol")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn libc_symbol_resolves() {
        // The test binary does not define `getpid`, so the next object is libc.
        assert!(resolve_next(c"getpid").is_ok());
    }
}
