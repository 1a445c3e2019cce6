//! Shared state owned by the module and published to peer components.
//!
//! - **SharedBuffer**: the lock-guarded 16-byte storage itself
//! - **ExportTable**: named publication point through which an independently
//!   started peer binds to the buffer

pub mod exports;
pub mod shared_buffer;

pub use exports::ExportTable;
pub use shared_buffer::{marker_from_bytes, write_marker_bytes, SharedBuffer, SHARED_BUFFER_LEN};
