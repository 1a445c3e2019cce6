//! Lock-guarded shared buffer.
//!
//! A fixed 16-byte storage cell behind a single mutex. The closure-scoped
//! [`SharedBuffer::with_lock`] is the only way at the bytes, so the locking
//! contract cannot be bypassed: every read and write happens while the lock
//! is held, and the lock is released on every exit path.
//!
//! The handle is cheaply clonable; the module publishes one through an
//! [`ExportTable`](crate::memory::ExportTable) so peer components mutate the
//! same storage under the same lock. The buffer outlives the worker that
//! writes to it: a peer may still hold a binding after the worker stops, so
//! the module releases the export last during teardown.

use parking_lot::Mutex;
use std::sync::Arc;

/// Fixed capacity of the shared storage.
pub const SHARED_BUFFER_LEN: usize = 16;

/// Handle to the shared 16-byte storage and its lock.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<[u8; SHARED_BUFFER_LEN]>>,
}

impl SharedBuffer {
    /// Create a new zeroed buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the storage.
    ///
    /// The lock is held for exactly the duration of the closure. Callers that
    /// need whole-value semantics (a reader never observing a torn mix of two
    /// writes) must perform the complete mutation inside one call.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut [u8; SHARED_BUFFER_LEN]) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Store a marker string under a single lock hold.
    ///
    /// Writes the string bytes followed by a terminating zero, truncating to
    /// capacity minus one. Bytes past the terminator keep their previous
    /// values; readers using [`read_marker`](Self::read_marker) stop at the
    /// terminator.
    pub fn store_marker(&self, marker: &str) {
        self.with_lock(|bytes| write_marker_bytes(bytes, marker));
    }

    /// Read the current marker string (bytes up to the first zero) under a
    /// single lock hold.
    pub fn read_marker(&self) -> String {
        self.with_lock(|bytes| marker_from_bytes(bytes))
    }

    /// Copy of the full storage under a single lock hold.
    pub fn snapshot(&self) -> [u8; SHARED_BUFFER_LEN] {
        self.with_lock(|bytes| *bytes)
    }
}

/// Write a zero-terminated marker into already-locked storage. For callers
/// that compose the write with further work under the same hold.
pub fn write_marker_bytes(bytes: &mut [u8; SHARED_BUFFER_LEN], marker: &str) {
    let n = marker.len().min(SHARED_BUFFER_LEN - 1);
    bytes[..n].copy_from_slice(&marker.as_bytes()[..n]);
    bytes[n] = 0;
}

/// Decode a zero-terminated marker from a storage snapshot.
pub fn marker_from_bytes(bytes: &[u8; SHARED_BUFFER_LEN]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(SHARED_BUFFER_LEN);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_zeroed() {
        let buf = SharedBuffer::new();
        assert_eq!(buf.snapshot(), [0u8; SHARED_BUFFER_LEN]);
        assert_eq!(buf.read_marker(), "");
    }

    #[test]
    fn marker_round_trip() {
        let buf = SharedBuffer::new();
        buf.store_marker("DEADBEEF");
        assert_eq!(buf.read_marker(), "DEADBEEF");

        // A shorter marker terminates earlier; trailing bytes are not
        // zero-filled but stay invisible behind the terminator.
        buf.store_marker("CAFFEE");
        assert_eq!(buf.read_marker(), "CAFFEE");
        let snap = buf.snapshot();
        assert_eq!(&snap[..6], b"CAFFEE");
        assert_eq!(snap[6], 0);
        assert_eq!(snap[7], b'F');
    }

    #[test]
    fn marker_truncates_at_capacity() {
        let buf = SharedBuffer::new();
        buf.store_marker("0123456789ABCDEFGHIJ");
        let marker = buf.read_marker();
        assert_eq!(marker.len(), SHARED_BUFFER_LEN - 1);
        assert_eq!(marker, "0123456789ABCDE");
    }

    #[test]
    fn clones_share_storage() {
        let a = SharedBuffer::new();
        let b = a.clone();
        a.store_marker("shared");
        assert_eq!(b.read_marker(), "shared");
    }

    #[test]
    fn with_lock_excludes_concurrent_writers() {
        let buf = SharedBuffer::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let buf = buf.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        buf.with_lock(|bytes| {
                            bytes.fill(i as u8);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Whole-value writes under the lock never tear.
        let snap = buf.snapshot();
        assert!(snap.iter().all(|&b| b == snap[0]));
    }
}
