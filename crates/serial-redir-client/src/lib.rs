//! serial-redir-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does serial-redir-client do? (for beginners)
//!
//! In a remote-desktop session the *server* may want to use a serial port
//! that is physically attached to the *client* machine.  The client announces
//! each configured port as a redirected device.  From then on the server sends
//! device I/O requests for it and the client:
//!
//! 1. Queues each request on the target device without blocking the caller.
//! 2. Executes requests one at a time, in order, on a dedicated worker thread
//!    per device.
//! 3. Translates Create, Close, Read, Write, and DeviceControl into calls on
//!    the native serial port (through the `serialport` crate).
//! 4. Answers every request exactly once with a status code and output bytes.

/// Application layer: request model, queue, worker, handlers, devices.
pub mod application;

/// Infrastructure layer: native serial drivers and configuration storage.
pub mod infrastructure;
