//! Peer consumer of the exported shared buffer.
//!
//! The boundary contract for any independently started component that wants
//! at the module's shared storage:
//!
//! 1. Bind the buffer through the [`ExportTable`](crate::memory::ExportTable)
//!    BEFORE touching any bytes. If the export is absent the peer must
//!    refuse to start; the coupling is deliberate, not optional.
//! 2. Perform every read and write inside
//!    [`with_lock`](crate::memory::SharedBuffer::with_lock). There is no
//!    other way at the bytes, and no ordering is guaranteed between the
//!    peer and the module's own worker; interleavings are nondeterministic.
//!
//! [`PeerConsumer`] is the reference implementation: a loop thread that
//! stamps its own marker into the buffer each iteration. Unlike the module
//! worker it does not dawdle under the lock; it writes and gets out.

use crate::error::Result;
use crate::memory::{marker_from_bytes, write_marker_bytes, ExportTable};
use crate::worker::{WorkerHandle, WorkerState};
use log::debug;
use std::time::Duration;

/// An independently started consumer bound to the module's shared buffer.
#[derive(Debug)]
pub struct PeerConsumer {
    worker: WorkerHandle,
}

impl PeerConsumer {
    /// Bind `export` in `exports` and start the consumer loop.
    ///
    /// Fails with `NotFound` before any thread is spawned when the export
    /// has not been published.
    pub fn start(
        exports: &ExportTable,
        export: &str,
        name: &str,
        marker: &str,
        idle: Duration,
    ) -> Result<Self> {
        let buffer = exports.bind(export)?;
        let marker = marker.to_string();
        let log_name = name.to_string();

        let worker = WorkerHandle::spawn(name, idle, 0, move || {
            buffer.with_lock(|bytes| {
                debug!("{}: lock held, found '{}'", log_name, marker_from_bytes(bytes));
                write_marker_bytes(bytes, &marker);
            });
            Ok(())
        })?;

        Ok(Self { worker })
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Cooperative stop; blocks until the loop thread has exited.
    pub fn stop(self) -> Result<i32> {
        self.worker.request_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VdevError;
    use crate::memory::SharedBuffer;

    #[test]
    fn refuses_to_start_without_the_export() {
        let exports = ExportTable::new();
        let err = PeerConsumer::start(
            &exports,
            "precious_data",
            "second_thread",
            "CAFFEE",
            Duration::from_millis(5),
        )
        .unwrap_err();
        assert!(matches!(err, VdevError::NotFound(_)));
    }

    #[test]
    fn writes_marker_once_bound() {
        let exports = ExportTable::new();
        let buffer = SharedBuffer::new();
        exports.publish("precious_data", buffer.clone()).unwrap();

        let peer = PeerConsumer::start(
            &exports,
            "precious_data",
            "second_thread",
            "CAFFEE",
            Duration::from_millis(2),
        )
        .unwrap();
        assert!(peer.is_running());

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(buffer.read_marker(), "CAFFEE");

        let code = peer.stop().unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn keeps_writing_after_export_revoked() {
        // Revocation only blocks future binds; a running peer holds its own
        // handle to the storage.
        let exports = ExportTable::new();
        let buffer = SharedBuffer::new();
        exports.publish("precious_data", buffer.clone()).unwrap();

        let peer = PeerConsumer::start(
            &exports,
            "precious_data",
            "second_thread",
            "CAFFEE",
            Duration::from_millis(2),
        )
        .unwrap();
        exports.revoke("precious_data");

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.read_marker(), "CAFFEE");
        peer.stop().unwrap();
    }
}
