//! Routes one request to its handler and completes it.

use serial_redir_core::{MajorFunction, NtStatus};
use tracing::{debug, warn};

use crate::application::handlers::SerialOperations;
use crate::application::irp::Irp;

/// Runs the handler for `irp.major_function`, then completes the request.
///
/// Unknown major function codes complete with [`NtStatus::NotSupported`] and
/// no output.  Every request passed in is completed exactly once.
pub fn dispatch<H>(handler: &mut H, mut irp: Irp)
where
    H: SerialOperations + ?Sized,
{
    debug!(
        major_function = irp.major_function,
        minor_function = irp.minor_function,
        completion_id = irp.completion_id,
        file_id = irp.file_id,
        "dispatch"
    );

    match MajorFunction::try_from(irp.major_function) {
        Ok(MajorFunction::Create) => handler.create(&mut irp),
        Ok(MajorFunction::Close) => handler.close(&mut irp),
        Ok(MajorFunction::Read) => handler.read(&mut irp),
        Ok(MajorFunction::Write) => handler.write(&mut irp),
        Ok(MajorFunction::DeviceControl) => handler.device_control(&mut irp),
        Err(code) => {
            warn!(major_function = code, "unsupported major function");
            irp.output.clear();
            irp.io_status = NtStatus::NotSupported;
        }
    }

    irp.complete();
}
