//! Per-device FIFO of pending requests.
//!
//! The submitter only ever calls [`IrpQueue::enqueue`], which never blocks.
//! The device's worker thread blocks in [`IrpQueue::dequeue_blocking`] until a
//! request arrives or [`IrpQueue::shutdown`] is called.
//!
//! The queue is unbounded: there is no backpressure toward the submitter.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::application::irp::Irp;

/// Result of a blocking dequeue.
#[derive(Debug)]
pub enum Dequeued {
    Request(Irp),
    /// Shutdown was signaled; requests still queued are left for [`IrpQueue::drain`].
    Shutdown,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<Irp>,
    shut_down: bool,
}

/// Unbounded multi-producer, single-consumer request queue.
#[derive(Default)]
pub struct IrpQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl IrpQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `irp` to the tail.
    ///
    /// # Errors
    ///
    /// Hands the request back if the queue has already been shut down.
    pub fn enqueue(&self, irp: Irp) -> Result<(), Irp> {
        let mut state = self.lock();
        if state.shut_down {
            return Err(irp);
        }
        state.items.push_back(irp);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a request is available or shutdown is signaled.
    ///
    /// Shutdown wins over queued requests.
    pub fn dequeue_blocking(&self) -> Dequeued {
        let mut state = self.lock();
        loop {
            if state.shut_down {
                return Dequeued::Shutdown;
            }
            if let Some(irp) = state.items.pop_front() {
                return Dequeued::Request(irp);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Signals shutdown and wakes every blocked dequeue.  Idempotent.
    pub fn shutdown(&self) {
        self.lock().shut_down = true;
        self.available.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Removes and returns every queued request in FIFO order.
    pub fn drain(&self) -> Vec<Irp> {
        self.lock().items.drain(..).collect()
    }

    /// Number of requests waiting.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every mutation of QueueState is a single push, pop, or flag store, so a
    // poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
