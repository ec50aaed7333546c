//! Domain rules for serial redirection.
//!
//! Pure logic with no OS, thread, or driver dependencies:
//!
//! - **`file_id`** – the per-device FileId counter.
//! - **`error_map`** – how a failed native control call is reported to the
//!   remote peer.

pub mod error_map;
pub mod file_id;
