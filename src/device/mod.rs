//! Virtual device records and their lifecycle controller.
//!
//! A [`ManagedDeviceDescriptor`] is a named, matchable record carrying a
//! [`DeviceConfiguration`] of lifecycle hooks. The [`DeviceController`]
//! matches a descriptor by name and drives attach/detach through those
//! hooks. Descriptors live in an id-indexed [`DeviceRegistry`]; components
//! hold ids, never raw references that could dangle after teardown.

pub mod controller;
pub mod descriptor;
pub mod registry;

pub use controller::{AttachOutcome, DeviceController};
pub use descriptor::{
    DeviceConfiguration, DeviceHooks, LoggingHooks, ManagedDeviceDescriptor, NoopHooks,
};
pub use registry::{DeviceId, DeviceRegistry};
