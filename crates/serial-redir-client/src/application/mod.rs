//! Application layer for the serial redirection client.
//!
//! # What happens to one request? (for beginners)
//!
//! 1. The transport hands a device I/O request PDU to the
//!    **`manager`** ([`manager::DeviceManager`]), which decodes it into an
//!    [`irp::Irp`] and routes it by `DeviceId`.
//! 2. The target **`device`** ([`device::SerialDevice`]) appends the request
//!    to its **`queue`** and returns immediately.
//! 3. The device's **`worker`** thread takes the request off the queue and
//!    hands it to the **`dispatch`** function.
//! 4. `dispatch` calls the matching operation in **`handlers`**, which drives
//!    the native port through the **`comm`** traits and fills in the status
//!    and output bytes.
//! 5. `dispatch` completes the request, invoking the transport's callback with
//!    an [`irp::IrpCompletion`].
//!
//! Nothing in this layer touches an OS serial API.  The concrete drivers are
//! injected from `infrastructure::comm`.

pub mod comm;
pub mod device;
pub mod dispatch;
pub mod handlers;
pub mod irp;
pub mod manager;
pub mod queue;
pub mod worker;
