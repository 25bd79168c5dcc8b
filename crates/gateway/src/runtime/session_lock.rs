//! Per-session serialization for browse transitions.
//!
//! Each session key maps to a `Semaphore(1)`.  One transition runs at a time
//! per session and at most one more may wait; anything beyond that is
//! rejected as busy so a flood of taps cannot queue without bound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const MAX_WAITERS: usize = 1;

struct Slot {
    sem: Arc<Semaphore>,
    waiting: AtomicUsize,
}

struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Slot>>>,
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `session_key`.  Hold the permit for the whole
    /// transition; it releases on drop.
    pub async fn acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let slot = {
            let mut locks = self.locks.lock();
            locks
                .entry(session_key.to_owned())
                .or_insert_with(|| {
                    Arc::new(Slot {
                        sem: Arc::new(Semaphore::new(1)),
                        waiting: AtomicUsize::new(0),
                    })
                })
                .clone()
        };

        if let Ok(permit) = slot.sem.clone().try_acquire_owned() {
            return Ok(permit);
        }

        if slot.waiting.fetch_add(1, Ordering::SeqCst) >= MAX_WAITERS {
            slot.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(SessionBusy);
        }
        // Released on drop so a cancelled waiter still frees its place.
        let _waiting = WaitGuard(&slot.waiting);
        slot.sem.clone().acquire_owned().await.map_err(|_| SessionBusy)
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Forget sessions nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.locks.lock().retain(|_, slot| {
            slot.sem.available_permits() == 0 || slot.waiting.load(Ordering::SeqCst) > 0
        });
    }
}

/// A transition is running and another is already queued for the session.
#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is busy; try again in a moment")
    }
}

impl std::error::Error for SessionBusy {}
