//! Admission control for concurrent simulations.
//!
//! Each admitted request holds one permit for the whole of its pipeline.
//! When the gate is full, further requests block until a permit is dropped.
//!
//! # Invariants
//!
//! - Outstanding permits never exceed capacity.
//! - Permits are RAII and released on drop, including during unwinding.
//! - A poisoned lock is recovered rather than propagated, so release never panics.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A blocking counting semaphore bounding in-flight pipelines.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    available: Mutex<usize>,
    cv: Condvar,
}

impl AdmissionGate {
    /// Creates a gate admitting `capacity` concurrent holders (at least one).
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            capacity,
            available: Mutex::new(capacity),
            cv: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.available
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Maximum number of concurrent holders.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes a permit if one is free.
    pub fn try_acquire(self: &Arc<Self>) -> Option<AdmissionPermit> {
        let mut avail = self.lock();
        if *avail == 0 {
            return None;
        }
        *avail -= 1;
        Some(self.permit())
    }

    /// Blocks until a permit is free.
    pub fn acquire(self: &Arc<Self>) -> AdmissionPermit {
        let mut avail = self.lock();
        if *avail == 0 {
            tracing::debug!(capacity = self.capacity, "waiting for admission");
        }
        while *avail == 0 {
            avail = self
                .cv
                .wait(avail)
                .unwrap_or_else(|poison| poison.into_inner());
        }
        *avail -= 1;
        self.permit()
    }

    /// Blocks for at most `timeout` waiting for a permit.
    pub fn acquire_timeout(self: &Arc<Self>, timeout: Duration) -> Option<AdmissionPermit> {
        let deadline = Instant::now() + timeout;
        let mut avail = self.lock();
        while *avail == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(avail, remaining)
                .unwrap_or_else(|poison| poison.into_inner());
            avail = guard;
        }
        *avail -= 1;
        Some(self.permit())
    }

    fn permit(self: &Arc<Self>) -> AdmissionPermit {
        AdmissionPermit {
            gate: Arc::clone(self),
        }
    }

    fn release(&self) {
        let mut avail = self.lock();
        *avail = (*avail + 1).min(self.capacity);
        drop(avail);
        self.cv.notify_one();
    }
}

/// One admitted pipeline. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    gate: Arc<AdmissionGate>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn capacity_is_at_least_one() {
        assert_eq!(AdmissionGate::new(0).capacity(), 1);
        let gate = AdmissionGate::new(3);
        let held: Vec<_> = (0..3).filter_map(|_| gate.try_acquire()).collect();
        assert_eq!(held.len(), 3);
    }

    #[test]
    fn try_acquire_respects_capacity() {
        let gate = AdmissionGate::new(2);
        let a = gate.try_acquire().unwrap();
        let _b = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_none());
        drop(a);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn acquire_timeout_expires_when_full() {
        let gate = AdmissionGate::new(1);
        let _held = gate.acquire();
        assert!(gate.acquire_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn acquire_timeout_takes_released_permit() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire();
        let g = Arc::clone(&gate);
        let waiter = thread::spawn(move || g.acquire_timeout(Duration::from_secs(5)).is_some());
        thread::sleep(Duration::from_millis(20));
        drop(held);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn blocked_acquire_wakes_on_release() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire();
        let g = Arc::clone(&gate);
        let waiter = thread::spawn(move || {
            let _p = g.acquire();
        });
        thread::sleep(Duration::from_millis(20));
        drop(held);
        waiter.join().unwrap();
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn concurrent_holders_never_exceed_capacity() {
        let gate = AdmissionGate::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..12)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _permit = gate.acquire();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let held: Vec<_> = (0..4).filter_map(|_| gate.try_acquire()).collect();
        assert_eq!(held.len(), 3);
    }

    #[test]
    fn permit_released_during_panic() {
        let gate = AdmissionGate::new(1);
        let g = Arc::clone(&gate);
        let result = thread::spawn(move || {
            let _p = g.acquire();
            panic!("pipeline blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(gate.try_acquire().is_some());
    }
}
