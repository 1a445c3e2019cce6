//! # vdev
//!
//! A virtual device runtime built from four cooperating pieces:
//!
//! - **Control surface**: a pseudo-filesystem tree of entries (bounded raw
//!   buffer, boolean cell) for runtime inspection and control
//! - **Shared state**: a 16-byte buffer behind one lock, published by name
//!   so independently started peer components mutate the same storage
//! - **Background worker**: a cancellable loop thread stamping a sentinel
//!   into the shared buffer
//! - **Device lifecycle**: a named device record matched by a controller
//!   that drives power_on/reset/power_off hooks
//!
//! The [`ModuleOrchestrator`] sequences these in a fixed order and unwinds
//! them in reverse, on failure and at teardown, releasing every acquired
//! resource exactly once.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vdev::{ModuleConfig, ModuleOrchestrator};
//!
//! let config = ModuleConfig::from_yaml("{}").unwrap();
//! let mut module = ModuleOrchestrator::new(config);
//! module.start().unwrap();
//! // ... the worker now periodically stamps the shared buffer ...
//! module.teardown();
//! ```
//!
//! ## Peers
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vdev::{ModuleConfig, ModuleOrchestrator, PeerConsumer};
//!
//! let mut module = ModuleOrchestrator::new(ModuleConfig::default());
//! module.start().unwrap();
//!
//! // Binding fails, and the peer refuses to start, when the module has
//! // not published the export.
//! let peer = PeerConsumer::start(
//!     &module.exports(),
//!     "precious_data",
//!     "second_thread",
//!     "CAFFEE",
//!     Duration::from_millis(100),
//! ).unwrap();
//!
//! peer.stop().unwrap();
//! module.teardown();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod peer;
pub mod surface;
pub mod worker;

// Re-export the commonly used types at the crate root.
pub use config::{DeviceConfig, ModuleConfig, SurfaceConfig, WorkerConfig};
pub use device::{
    AttachOutcome, DeviceConfiguration, DeviceController, DeviceHooks, DeviceId, DeviceRegistry,
    LoggingHooks, ManagedDeviceDescriptor, NoopHooks,
};
pub use error::{Result, VdevError, VdevResult};
pub use memory::{ExportTable, SharedBuffer, SHARED_BUFFER_LEN};
pub use orchestrator::{
    LifecycleEvent, ModuleOrchestrator, ModuleState, StartupStep, SurfaceHandles, BOOLVAL_ENTRY,
    CUSTOM_VALUE_ENTRY, WORKER_NAME,
};
pub use peer::PeerConsumer;
pub use surface::{AccessMode, ControlSurface, EntryId, RAW_BUFFER_CAPACITY};
pub use worker::{WorkerHandle, WorkerState};
