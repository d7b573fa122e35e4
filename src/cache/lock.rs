use std::sync::{Condvar, LockResult, Mutex, MutexGuard};

use tracing::warn;

/// Unwraps a lock result, keeping the guard when another holder panicked.
///
/// Cache state is always safe to reuse after a panic: the worst case is a stale or
/// missing entry, which the next read-through repairs.
fn recover<G>(
    result: LockResult<G>,
    target: &'static str,
    op: &'static str,
    lock_kind: &'static str,
) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            lock_kind,
            result = "poisoned_recovered",
            hint = "entry may be stale after panic in another thread",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(lock.lock(), target, op, "mutex.lock")
}

pub(crate) fn condvar_wait<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(condvar.wait(guard), target, op, "condvar.wait")
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn mutex_lock_recovers_after_panicking_holder() {
        let lock = Mutex::new(vec![1]);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = lock.lock().unwrap();
            guard.push(2);
            panic!("poison");
        }));
        assert!(lock.is_poisoned());

        let guard = mutex_lock(&lock, "cache::lock::tests", "recover");
        assert_eq!(*guard, vec![1, 2]);
    }
}
