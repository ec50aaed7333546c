//! Per-device FileId allocation.
//!
//! # What is a FileId? (for beginners)
//!
//! Every successful Create hands the remote peer an opaque number called a
//! *FileId*.  The peer quotes it back on every later request for that open
//! session.  FileIds are scoped to one device and must never repeat while the
//! device exists, so a plain incrementing counter is enough.
//!
//! # Thread safety
//!
//! Only the device's worker thread allocates FileIds, but the counter is an
//! `AtomicU32` so that a device manager can read [`FileIdCounter::current`]
//! from another thread without a lock.  The worker is the sole writer.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The first FileId handed out on a fresh device.
pub const FIRST_FILE_ID: u32 = 1;

/// A strictly increasing FileId source that never wraps.
///
/// # Examples
///
/// ```rust
/// use serial_redir_core::FileIdCounter;
///
/// let counter = FileIdCounter::new();
/// assert_eq!(counter.next(), Some(1));
/// assert_eq!(counter.next(), Some(2));
/// ```
#[derive(Debug)]
pub struct FileIdCounter {
    /// The value the next call to [`FileIdCounter::next`] returns.
    next: AtomicU32,
    exhausted: AtomicBool,
}

impl FileIdCounter {
    /// Creates a counter whose first FileId is [`FIRST_FILE_ID`].
    pub fn new() -> Self {
        Self::starting_at(FIRST_FILE_ID)
    }

    /// Creates a counter whose first FileId is `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Returns the next FileId, or `None` once `u32::MAX` has been handed out.
    ///
    /// Never wraps; the caller turns `None` into a failed Create.
    pub fn next(&self) -> Option<u32> {
        if self.exhausted.load(Ordering::Acquire) {
            return None;
        }
        let id = self.next.load(Ordering::Acquire);
        match id.checked_add(1) {
            Some(following) => self.next.store(following, Ordering::Release),
            None => self.exhausted.store(true, Ordering::Release),
        }
        Some(id)
    }

    /// Returns the value the next successful allocation would yield.
    pub fn current(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }
}

impl Default for FileIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
