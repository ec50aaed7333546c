//! The registry of redirected devices.
//!
//! [`DeviceManager`] assigns device ids, owns every registered device, and
//! routes incoming requests by `DeviceId`.  It is the application-layer entry
//! point a transport (or the `serve` command) talks to.

use serial_redir_core::{NtStatus, ProtocolError};
use tracing::{info, warn};

use crate::application::comm::CommDriver;
use crate::application::device::{DeviceError, RedirectedDevice, SerialDevice};
use crate::application::irp::{Irp, IrpCompletion};
use crate::application::worker::ShutdownPolicy;

/// Owns registered devices in registration order.
#[derive(Default)]
pub struct DeviceManager {
    devices: Vec<Box<dyn RedirectedDevice>>,
    next_id: u32,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers a serial port and starts its worker.
    ///
    /// Returns the assigned device id.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::EmptyName`] / [`DeviceError::AutoDetect`] for an empty
    ///   or `*`-prefixed name.
    /// - [`DeviceError::EmptyPath`] when `path` is empty.
    /// - [`DeviceError::Spawn`] if the worker thread cannot be created.
    pub fn register_serial(
        &mut self,
        name: &str,
        path: &str,
        driver: Box<dyn CommDriver>,
        policy: ShutdownPolicy,
    ) -> Result<u32, DeviceError> {
        if name.is_empty() {
            return Err(DeviceError::EmptyName);
        }
        if name.starts_with('*') {
            return Err(DeviceError::AutoDetect(name.to_string()));
        }
        if path.is_empty() {
            return Err(DeviceError::EmptyPath {
                name: name.to_string(),
            });
        }

        let id = self.allocate_id()?;
        let device = SerialDevice::spawn(id, name, path, driver, policy)?;
        self.devices.push(Box::new(device));
        Ok(id)
    }

    /// Routes `irp` to its device.  Unknown device ids complete as unsuccessful.
    pub fn submit(&self, irp: Irp) {
        match self.get(irp.device_id) {
            Some(device) => device.submit(irp),
            None => {
                warn!(device_id = irp.device_id, "request for unknown device");
                irp.complete_with(NtStatus::Unsuccessful);
            }
        }
    }

    /// Decodes a device I/O request PDU and routes it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the PDU header is malformed; nothing is
    /// submitted in that case.
    pub fn submit_pdu<F>(&self, bytes: &[u8], on_complete: F) -> Result<(), ProtocolError>
    where
        F: FnOnce(IrpCompletion) + Send + 'static,
    {
        let irp = Irp::from_pdu(bytes, on_complete)?;
        self.submit(irp);
        Ok(())
    }

    pub fn get(&self, device_id: u32) -> Option<&dyn RedirectedDevice> {
        self.devices
            .iter()
            .find(|d| d.id() == device_id)
            .map(|d| d.as_ref())
    }

    /// Registered devices in registration order.
    pub fn devices(&self) -> impl Iterator<Item = &dyn RedirectedDevice> {
        self.devices.iter().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Tears every device down in registration order and forgets them.
    pub fn teardown_all(&mut self) {
        if self.devices.is_empty() {
            return;
        }
        info!(count = self.devices.len(), "tearing down devices");
        for device in &mut self.devices {
            device.teardown();
        }
        self.devices.clear();
    }

    fn allocate_id(&mut self) -> Result<u32, DeviceError> {
        // `Default` leaves next_id at 0; ids start at 1.
        let id = self.next_id.max(1);
        self.next_id = id.checked_add(1).ok_or(DeviceError::IdsExhausted)?;
        Ok(id)
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.teardown_all();
    }
}
