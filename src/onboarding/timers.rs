//! Deferred, cancellable step timers.
//!
//! Each session has one slot. Scheduling replaces (and aborts) whatever was
//! pending; a firing task claims its own slot with its ticket before acting,
//! so a transition it triggers cannot abort the task mid-flight.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;

/// Identifies one scheduled task. Stale tickets fail to claim the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    generation: u64,
}

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct StepTimers {
    slot: Mutex<Option<Pending>>,
    generation: AtomicU64,
}

impl StepTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the future built by `build`, cancelling anything pending.
    pub fn schedule<F, Fut>(&self, build: F) -> TimerTicket
    where
        F: FnOnce(TimerTicket) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = TimerTicket {
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
        };
        let mut slot = self.lock();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }
        let handle = tokio::spawn(build(ticket));
        *slot = Some(Pending {
            generation: ticket.generation,
            handle,
        });
        ticket
    }

    /// Abort the pending task, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Release the slot on behalf of a firing task without aborting it.
    ///
    /// Returns false if the task was superseded or cancelled meanwhile.
    pub fn claim(&self, ticket: TimerTicket) -> bool {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(pending) if pending.generation == ticket.generation => {
                slot.take();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|p| !p.handle.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        // A poisoned slot still holds a valid Option.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for StepTimers {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = slot.take() {
            pending.handle.abort();
        }
    }
}

impl std::fmt::Debug for StepTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepTimers")
            .field("pending", &self.is_pending())
            .finish()
    }
}
