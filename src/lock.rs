use std::sync::{Mutex, MutexGuard};

/// Lock `lock`, taking the inner value back if a panicking holder poisoned it.
///
/// Dispatcher state stays consistent across a collaborator panic, so metering
/// keeps going instead of propagating the poison.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            crate::log_debug(&format!("Mutex poisoned in {context}; recovering"));
            poisoned.into_inner()
        }
    }
}
