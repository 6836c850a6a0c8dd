//! Environment helpers for tests that touch process-wide env vars.

use std::sync::{Mutex, MutexGuard};

/// Serializes every test in this crate that reads or mutates env vars.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Lock the env mutex, recovering from a poisoned lock left by a failed test.
pub fn lock_env(mutex: &'static Mutex<()>) -> MutexGuard<'static, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
pub unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) };
}

/// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
pub unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) };
}
