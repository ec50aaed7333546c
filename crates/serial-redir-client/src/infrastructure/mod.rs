//! Infrastructure layer for the client application.
//!
//! Contains OS-facing adapters: the native serial drivers and the TOML
//! configuration store.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `serial_redir_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`comm`** – Implementations of the `CommDriver`/`CommPort` traits:
//!   `SerialPortDriver` on top of the `serialport` crate and an in-memory
//!   `LoopbackDriver` for tests and the `probe --loopback` command.
//!
//! - **`storage`** – TOML configuration loading and saving.

pub mod comm;
pub mod storage;
