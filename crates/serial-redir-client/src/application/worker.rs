//! The per-device worker loop.
//!
//! # Why one thread per device? (for beginners)
//!
//! Serial reads block until the device produces data or its timeout expires.
//! If every device shared one thread, a silent modem on `COM1` would stall a
//! busy barcode scanner on `COM2`.  Each device therefore owns one OS thread
//! that pulls requests from its queue and executes them one at a time, in
//! arrival order.  Requests for the same device never run concurrently.

use serde::{Deserialize, Serialize};
use serial_redir_core::NtStatus;
use tracing::{debug, info};

use crate::application::dispatch::dispatch;
use crate::application::handlers::SerialOperations;
use crate::application::queue::{Dequeued, IrpQueue};

/// What happens to requests still queued when a device is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Complete every leftover request with [`NtStatus::Cancelled`].
    #[default]
    Drain,
    /// Discard leftover requests without completing them.
    Drop,
}

/// Counters reported when the worker loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerExit {
    /// Requests dispatched to a handler.
    pub processed: u64,
    /// Leftover requests completed as cancelled.
    pub drained: u64,
    /// Leftover requests discarded.
    pub dropped: u64,
}

/// Runs until `queue` is shut down, then disposes of leftovers per `policy`.
///
/// A request dequeued before shutdown is observed always runs to completion.
pub fn run_worker<H>(queue: &IrpQueue, handler: &mut H, policy: ShutdownPolicy) -> WorkerExit
where
    H: SerialOperations + ?Sized,
{
    let mut exit = WorkerExit::default();

    loop {
        match queue.dequeue_blocking() {
            Dequeued::Request(irp) => {
                dispatch(handler, irp);
                exit.processed += 1;
            }
            Dequeued::Shutdown => break,
        }
    }

    let leftovers = queue.drain();
    if !leftovers.is_empty() {
        debug!(count = leftovers.len(), ?policy, "disposing of queued requests");
    }
    for irp in leftovers {
        match policy {
            ShutdownPolicy::Drain => {
                irp.complete_with(NtStatus::Cancelled);
                exit.drained += 1;
            }
            ShutdownPolicy::Drop => {
                // Completion is skipped on purpose; Irp's Drop logs it.
                drop(irp);
                exit.dropped += 1;
            }
        }
    }

    info!(
        processed = exit.processed,
        drained = exit.drained,
        dropped = exit.dropped,
        "worker stopped"
    );
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::MockSerialOperations;
    use crate::application::irp::Irp;
    use serial_redir_core::protocol::pdu::IoRequestHeader;
    use std::sync::mpsc;

    fn read_irp(completion_id: u32, tx: mpsc::Sender<(u32, NtStatus)>) -> Irp {
        Irp::new(
            IoRequestHeader {
                device_id: 1,
                file_id: 1,
                completion_id,
                major_function: 0x03,
                minor_function: 0,
            },
            Vec::new(),
            move |c| tx.send((c.completion_id, c.status)).unwrap(),
        )
    }

    #[test]
    fn test_shutdown_policy_defaults_to_drain() {
        assert_eq!(ShutdownPolicy::default(), ShutdownPolicy::Drain);
    }

    #[test]
    fn test_worker_with_empty_shut_down_queue_exits_immediately() {
        let queue = IrpQueue::new();
        queue.shutdown();
        let mut mock = MockSerialOperations::new();

        let exit = run_worker(&queue, &mut mock, ShutdownPolicy::Drain);

        assert_eq!(exit, WorkerExit::default());
    }

    #[test]
    fn test_drain_policy_cancels_leftovers_in_order() {
        // Arrange – shutdown before the worker starts, so nothing is dispatched
        let queue = IrpQueue::new();
        let (tx, rx) = mpsc::channel();
        for id in 1..=3 {
            queue.enqueue(read_irp(id, tx.clone())).unwrap();
        }
        queue.shutdown();
        let mut mock = MockSerialOperations::new();
        mock.expect_read().never();

        // Act
        let exit = run_worker(&queue, &mut mock, ShutdownPolicy::Drain);

        // Assert
        assert_eq!(exit.drained, 3);
        assert_eq!(exit.processed, 0);
        drop(tx);
        let completions: Vec<_> = rx.iter().collect();
        assert_eq!(
            completions,
            vec![
                (1, NtStatus::Cancelled),
                (2, NtStatus::Cancelled),
                (3, NtStatus::Cancelled)
            ]
        );
    }

    #[test]
    fn test_drop_policy_never_completes_leftovers() {
        let queue = IrpQueue::new();
        let (tx, rx) = mpsc::channel();
        queue.enqueue(read_irp(1, tx.clone())).unwrap();
        queue.enqueue(read_irp(2, tx)).unwrap();
        queue.shutdown();
        let mut mock = MockSerialOperations::new();

        let exit = run_worker(&queue, &mut mock, ShutdownPolicy::Drop);

        assert_eq!(exit.dropped, 2);
        assert!(rx.recv().is_err(), "no completion may be delivered");
    }

    #[test]
    fn test_worker_processes_requests_until_shutdown() {
        // Arrange – the handler shuts the queue down while running request 2
        let queue = std::sync::Arc::new(IrpQueue::new());
        let (tx, rx) = mpsc::channel();
        for id in 1..=2 {
            queue.enqueue(read_irp(id, tx.clone())).unwrap();
        }
        drop(tx);
        let q = std::sync::Arc::clone(&queue);
        let mut mock = MockSerialOperations::new();
        mock.expect_read().times(2).returning(move |irp| {
            irp.io_status = NtStatus::Success;
            if irp.completion_id == 2 {
                q.shutdown();
            }
        });

        // Act
        let exit = run_worker(&queue, &mut mock, ShutdownPolicy::Drain);

        // Assert
        assert_eq!(exit.processed, 2);
        let completions: Vec<_> = rx.iter().collect();
        assert_eq!(
            completions,
            vec![(1, NtStatus::Success), (2, NtStatus::Success)],
            "an in-flight request finishes normally"
        );
    }

    #[test]
    fn test_policy_parses_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ShutdownPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"drop\"").unwrap();
        assert_eq!(w.policy, ShutdownPolicy::Drop);
    }
}
