//! Named publication of shared buffers.
//!
//! A peer component never reaches the module's storage through ambient
//! globals; it must be handed an [`ExportTable`] and bind the buffer by
//! name. Binding fails when the exporting module has not published, which
//! makes the coupling and its failure mode explicit: the peer refuses to
//! start instead of silently running against nothing.

use crate::error::{Result, VdevError};
use crate::memory::SharedBuffer;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Table of named shared-buffer exports.
///
/// Cheaply clonable; all clones see the same table.
#[derive(Clone, Debug, Default)]
pub struct ExportTable {
    entries: Arc<Mutex<HashMap<String, SharedBuffer>>>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `buffer` under `name`. Refuses duplicates: an export name is
    /// a contract with peers and must not be rebound silently.
    pub fn publish(&self, name: &str, buffer: SharedBuffer) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return Err(VdevError::already_exists(format!("export '{}'", name)));
        }
        entries.insert(name.to_string(), buffer);
        Ok(())
    }

    /// Bind the buffer published under `name`.
    ///
    /// Returns `NotFound` when no such export exists; callers are expected
    /// to treat that as fatal to their own startup.
    pub fn bind(&self, name: &str) -> Result<SharedBuffer> {
        self.entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| VdevError::not_found(format!("export '{}'", name)))
    }

    /// Withdraw the export. Existing bindings stay valid (they hold their
    /// own handle); only future binds fail. Returns whether the name was
    /// published.
    pub fn revoke(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Whether `name` is currently published.
    pub fn is_published(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }
}
