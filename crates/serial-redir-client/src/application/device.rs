//! Redirected device records and the serial device lifecycle.
//!
//! A [`SerialDevice`] owns the request queue and the worker thread.  The
//! worker owns everything else: the [`SerialSession`] with its open handle and
//! FileId counter.  Submitting only touches the queue, so it never blocks on
//! device I/O.
//!
//! Teardown order: signal shutdown, join the worker (which drains or drops the
//! leftovers and closes any open handle as the session goes out of scope),
//! then release the queue and the record itself.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serial_redir_core::protocol::wire::DEVICE_TYPE_SERIAL;
use serial_redir_core::{FileIdCounter, NtStatus};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Span};

use crate::application::comm::CommDriver;
use crate::application::handlers::SerialSession;
use crate::application::irp::Irp;
use crate::application::queue::IrpQueue;
use crate::application::worker::{run_worker, ShutdownPolicy, WorkerExit};

/// Errors raised while registering or tearing down a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device name must not be empty")]
    EmptyName,

    #[error("device name {0:?} requests auto-detection, which is not supported")]
    AutoDetect(String),

    #[error("device {name:?} has no path")]
    EmptyPath { name: String },

    #[error("failed to spawn worker thread for {name:?}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device id space exhausted")]
    IdsExhausted,
}

/// A device the redirection channel can send requests to.
pub trait RedirectedDevice: Send + Sync {
    /// Channel-assigned device id.
    fn id(&self) -> u32;

    /// Preferred DOS name announced to the peer (for example `COM1`).
    fn name(&self) -> &str;

    /// RDPDR device type.
    fn device_type(&self) -> u32;

    /// Device announce payload.
    fn announce_data(&self) -> Vec<u8>;

    /// Queues `irp` for execution.  Never blocks on device I/O.
    fn submit(&self, irp: Irp);

    /// Stops the device and releases its resources.  Idempotent.
    fn teardown(&mut self);
}

/// Lifecycle of a [`SerialDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Running,
    Terminated,
}

/// One redirected serial port.
pub struct SerialDevice {
    id: u32,
    name: String,
    path: String,
    policy: ShutdownPolicy,
    queue: Arc<IrpQueue>,
    file_ids: Arc<FileIdCounter>,
    worker: Option<JoinHandle<WorkerExit>>,
    state: DeviceState,
    span: Span,
}

impl SerialDevice {
    /// Registers the device and starts its worker thread `serial-<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Spawn`] if the OS refuses to create the thread.
    pub fn spawn(
        id: u32,
        name: impl Into<String>,
        path: impl Into<String>,
        driver: Box<dyn CommDriver>,
        policy: ShutdownPolicy,
    ) -> Result<Self, DeviceError> {
        let name = name.into();
        let path = path.into();
        let queue = Arc::new(IrpQueue::new());
        let file_ids = Arc::new(FileIdCounter::new());
        let span = info_span!("serial", device_id = id, name = %name);

        let worker = {
            let queue = Arc::clone(&queue);
            let file_ids = Arc::clone(&file_ids);
            let span = span.clone();
            let path = path.clone();
            thread::Builder::new()
                .name(format!("serial-{name}"))
                .spawn(move || {
                    let _entered = span.enter();
                    let mut session = SerialSession::new(driver, path, file_ids);
                    run_worker(&queue, &mut session, policy)
                })
                .map_err(|source| DeviceError::Spawn {
                    name: name.clone(),
                    source,
                })?
        };

        span.in_scope(|| info!(%path, ?policy, "device registered"));

        Ok(Self {
            id,
            name,
            path,
            policy,
            queue,
            file_ids,
            worker: Some(worker),
            state: DeviceState::Running,
            span,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Requests waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The FileId the next successful Create will receive.
    pub fn next_file_id(&self) -> u32 {
        self.file_ids.current()
    }
}

impl RedirectedDevice for SerialDevice {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> u32 {
        DEVICE_TYPE_SERIAL
    }

    fn announce_data(&self) -> Vec<u8> {
        announce_data_for(&self.name)
    }

    fn submit(&self, irp: Irp) {
        let Err(irp) = self.queue.enqueue(irp) else {
            return;
        };
        let _entered = self.span.enter();
        match self.policy {
            ShutdownPolicy::Drain => {
                warn!(completion_id = irp.completion_id, "submit after teardown; cancelling");
                irp.complete_with(NtStatus::Cancelled);
            }
            ShutdownPolicy::Drop => {
                warn!(completion_id = irp.completion_id, "submit after teardown; dropping");
                drop(irp);
            }
        }
    }

    fn teardown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _entered = self.span.enter();
        self.queue.shutdown();
        match worker.join() {
            Ok(exit) => info!(
                processed = exit.processed,
                drained = exit.drained,
                dropped = exit.dropped,
                "device torn down"
            ),
            Err(_) => error!("worker thread panicked"),
        }
        self.state = DeviceState::Terminated;
    }
}

impl Drop for SerialDevice {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Builds the announce payload: `name` with non-ASCII bytes replaced by `_`,
/// NUL-terminated.
pub fn announce_data_for(name: &str) -> Vec<u8> {
    name.bytes()
        .map(|b| if b.is_ascii() { b } else { b'_' })
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::comm::{MockCommDriver, MockCommPort};
    use serial_redir_core::protocol::pdu::IoRequestHeader;
    use serial_redir_core::protocol::wire::CreateRequest;
    use std::sync::mpsc;
    use std::time::Duration;

    fn create_irp(completion_id: u32, tx: mpsc::Sender<(u32, NtStatus, Vec<u8>)>) -> Irp {
        Irp::new(
            IoRequestHeader {
                device_id: 1,
                file_id: 0,
                completion_id,
                major_function: 0x00,
                minor_function: 0,
            },
            CreateRequest::default().encode(),
            move |c| {
                let _ = tx.send((c.completion_id, c.status, c.output));
            },
        )
    }

    fn openable_driver() -> MockCommDriver {
        let mut driver = MockCommDriver::new();
        driver.expect_open().returning(|_| {
            let mut port = MockCommPort::new();
            port.expect_close().returning(|| Ok(()));
            Ok(Box::new(port))
        });
        driver
    }

    fn spawn_device(id: u32, driver: MockCommDriver, policy: ShutdownPolicy) -> SerialDevice {
        SerialDevice::spawn(id, format!("COM{id}"), "/dev/ttyS0", Box::new(driver), policy)
            .expect("spawn must succeed")
    }

    #[test]
    fn test_announce_data_is_nul_terminated() {
        assert_eq!(announce_data_for("COM1"), b"COM1\0".to_vec());
    }

    #[test]
    fn test_announce_data_replaces_non_ascii_bytes() {
        // "é" is two UTF-8 bytes
        assert_eq!(announce_data_for("Cé"), b"C__\0".to_vec());
    }

    #[test]
    fn test_spawned_device_executes_submitted_create() {
        // Arrange
        let device = spawn_device(1, openable_driver(), ShutdownPolicy::Drain);
        let (tx, rx) = mpsc::channel();

        // Act
        device.submit(create_irp(7, tx));

        // Assert
        let (id, status, output) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(id, 7);
        assert_eq!(status, NtStatus::Success);
        assert_eq!(output, vec![1, 0, 0, 0, 0]);
        assert_eq!(device.device_type(), DEVICE_TYPE_SERIAL);
        assert_eq!(device.next_file_id(), 2);
    }

    #[test]
    fn test_teardown_is_idempotent_and_terminates() {
        let mut device = spawn_device(2, MockCommDriver::new(), ShutdownPolicy::Drain);

        device.teardown();
        device.teardown();

        assert_eq!(device.state(), DeviceState::Terminated);
    }

    #[test]
    fn test_submit_after_teardown_is_cancelled_under_drain() {
        let mut device = spawn_device(3, MockCommDriver::new(), ShutdownPolicy::Drain);
        device.teardown();
        let (tx, rx) = mpsc::channel();

        device.submit(create_irp(9, tx));

        let (id, status, _) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!((id, status), (9, NtStatus::Cancelled));
    }

    #[test]
    fn test_submit_after_teardown_is_dropped_under_drop_policy() {
        let mut device = spawn_device(4, MockCommDriver::new(), ShutdownPolicy::Drop);
        device.teardown();
        let (tx, rx) = mpsc::channel();

        device.submit(create_irp(9, tx));

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
