//! The FIFO lock (`spec.md` §5): a mutual-exclusion primitive with strict
//! arrival-order admission. Implemented as a ticket lock — each caller draws
//! a ticket, then waits until it is "now serving"; releasing advances the
//! serving counter and wakes everyone, which matches the source's
//! `FifoLock` (a shared queue; the current holder, on exit, notifies the
//! next waiter) without needing an explicit queue of wakers: ticket order
//! *is* arrival order.

use std::sync::{Condvar, Mutex, MutexGuard};

struct TicketState {
    next: u64,
    now_serving: u64,
}

/// A value protected by FIFO-fair mutual exclusion.
pub struct FifoLock<T> {
    ticket: Mutex<TicketState>,
    cond: Condvar,
    data: Mutex<T>,
}

impl<T> FifoLock<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            ticket: Mutex::new(TicketState {
                next: 0,
                now_serving: 0,
            }),
            cond: Condvar::new(),
            data: Mutex::new(value),
        }
    }

    /// Enqueues the caller and blocks until every earlier arrival has
    /// released the lock, then returns exclusive access.
    pub fn lock(&self) -> FifoLockGuard<'_, T> {
        let my_ticket = {
            let mut state = self.ticket.lock().unwrap();
            let ticket = state.next;
            state.next += 1;
            ticket
        };
        let mut state = self.ticket.lock().unwrap();
        while state.now_serving != my_ticket {
            state = self.cond.wait(state).unwrap();
        }
        drop(state);

        // At most one ticket holder proceeds past the wait above at a time,
        // so this acquisition is uncontended.
        let guard = self.data.lock().unwrap();
        FifoLockGuard {
            guard: Some(guard),
            lock: self,
        }
    }
}

/// RAII guard; dropping it admits the next queued waiter in arrival order.
pub struct FifoLockGuard<'a, T> {
    guard: Option<MutexGuard<'a, T>>,
    lock: &'a FifoLock<T>,
}

impl<T> std::ops::Deref for FifoLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.guard.as_ref().unwrap()
    }
}

impl<T> std::ops::DerefMut for FifoLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().unwrap()
    }
}

impl<T> Drop for FifoLockGuard<'_, T> {
    fn drop(&mut self) {
        self.guard.take();
        let mut state = self.lock.ticket.lock().unwrap();
        state.now_serving += 1;
        self.lock.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn admits_waiters_in_arrival_order() {
        let lock = Arc::new(FifoLock::new(Vec::<u32>::new()));
        let barrier = Arc::new(std::sync::Barrier::new(4));

        // Grab the lock first so the three spawned threads queue up behind
        // it in a known order.
        let first_guard = lock.lock();

        let mut handles = Vec::new();
        for i in 0..3u32 {
            let lock = Arc::clone(&lock);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                // Give the previous thread a moment to enqueue first; this
                // is a best-effort ordering nudge, not a correctness
                // requirement (the ticket is drawn the instant `lock` is
                // entered).
                std::thread::sleep(std::time::Duration::from_millis(5 * i as u64));
                let mut guard = lock.lock();
                guard.push(i);
            }));
        }

        // Let the spawned threads draw their tickets before we release.
        std::thread::sleep(std::time::Duration::from_millis(50));
        drop(first_guard);

        for h in handles {
            h.join().unwrap();
        }

        let final_guard = lock.lock();
        assert_eq!(final_guard.len(), 3);
    }

    #[test]
    fn data_is_exclusively_accessible() {
        let lock = FifoLock::new(0u32);
        {
            let mut g = lock.lock();
            *g += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }
}
