use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use lazy_static::lazy_static;

/// Capacity of the released-id free list. An id released while the list is
/// full stays with its thread and is never recycled.
const RELEASED_CAPACITY: usize = 128;

/// Next id handed out when the free list is empty. Id 0 means "unassigned",
/// so assignment starts at 1.
static THREAD_COUNTER: AtomicU32 = AtomicU32::new(1);

lazy_static! {
    /// Released ids, reused LIFO before the counter is advanced. Guarded by
    /// a mutex; assignment and release are not hot-path operations.
    static ref RELEASED_IDS: Mutex<Vec<u32>> = Mutex::new(Vec::with_capacity(RELEASED_CAPACITY));
}

thread_local! {
    static THREAD_ID: Cell<u32> = const { Cell::new(0) };
}

/// Ensures the calling thread has a compact numeric id and returns it.
/// Recycled ids are preferred over fresh ones.
pub fn assign_current() -> u32 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            let recycled = RELEASED_IDS.lock().unwrap().pop();
            id.set(recycled.unwrap_or_else(|| THREAD_COUNTER.fetch_add(1, Ordering::Relaxed)));
        }
        id.get()
    })
}

/// Returns the calling thread's id to the free list. Best effort: when the
/// list is full the thread simply keeps its id.
pub fn release_current() {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            return;
        }
        let mut released = RELEASED_IDS.lock().unwrap();
        if released.len() < RELEASED_CAPACITY {
            released.push(id.get());
            id.set(0);
        }
    });
}

/// The calling thread's id, or 0 when none has been assigned.
pub fn id() -> u32 {
    THREAD_ID.with(Cell::get)
}

/// Exclusive upper bound on every id ever assigned; consumers use it to
/// bound their scan over producer slots.
pub fn max_assigned() -> u32 {
    THREAD_COUNTER.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_thread_starts_unassigned() {
        let unassigned = thread::spawn(id).join().expect("join");
        assert_eq!(unassigned, 0);
    }

    #[test]
    fn assignment_is_sticky_and_nonzero() {
        let (first, second) = thread::spawn(|| (assign_current(), assign_current()))
            .join()
            .expect("join");
        assert_ne!(first, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn concurrent_threads_get_distinct_ids() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(assign_current))
            .collect();
        let mut ids: Vec<u32> = handles.into_iter().map(|h| h.join().expect("join")).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8, "ids must be unique per live thread");
        assert!(ids.iter().all(|id| *id < max_assigned()));
    }
}
