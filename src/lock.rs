use std::sync::{Mutex, MutexGuard};

/// Take the lock even if a panicking audio callback poisoned it; the guarded
/// data is plain sample storage and stays usable.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            crate::log_debug(&format!("mutex poisoned in {context}; recovering"));
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn recovers_data_from_poisoned_mutex() {
        let shared = Arc::new(Mutex::new(vec![1.0f32, 2.0]));
        let clone = Arc::clone(&shared);
        let _ = thread::spawn(move || {
            let mut guard = clone.lock().expect("lock");
            guard.push(3.0);
            panic!("poison the lock");
        })
        .join();
        assert!(shared.is_poisoned());
        let guard = lock_or_recover(&shared, "test");
        assert_eq!(*guard, vec![1.0, 2.0, 3.0]);
    }
}
