//! Control surface: a small pseudo-filesystem tree for runtime inspection
//! and control.
//!
//! Entries live under a named root directory and become visible as soon as
//! they are attached. Two leaf kinds exist:
//!
//! - a fixed-capacity raw buffer with offset-addressed partial read/write
//! - a single boolean cell with whole-value read/write
//!
//! Removal is leaf-before-root: a directory that still has children refuses
//! to go away.

pub mod entry;
pub mod registry;

pub use entry::{parse_bool_text, AccessMode, RawBuffer, RAW_BUFFER_CAPACITY};
pub use registry::{ControlSurface, EntryId};
