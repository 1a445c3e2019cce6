//! Module configuration.
//!
//! Typed configuration for a `vdev.yaml` module file. Every field has a
//! default matching the stock virtual device, so an empty document yields a
//! working module.
//!
//! # Example vdev.yaml
//!
//! ```yaml
//! surface:
//!   root: e_device
//!
//! worker:
//!   hold_ms: 1000     # lock held across the simulated work
//!   idle_ms: 100      # sleep between iterations
//!   sentinel: DEADBEEF
//!   exit_code: 42
//!
//! device:
//!   name: e_device
//!   match_name: e_device
//!   settle_ms: 5
//!
//! export: precious_data
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level module configuration from vdev.yaml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModuleConfig {
    /// Control-surface settings.
    pub surface: SurfaceConfig,

    /// Background worker settings.
    pub worker: WorkerConfig,

    /// Virtual device and controller settings.
    pub device: DeviceConfig,

    /// Name under which the shared buffer is published for peer modules.
    pub export: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceConfig::default(),
            worker: WorkerConfig::default(),
            device: DeviceConfig::default(),
            export: default_export_name(),
        }
    }
}

/// Control-surface section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Name of the root directory entry.
    pub root: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            root: "e_device".to_string(),
        }
    }
}

/// Background worker section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long the worker holds the shared-buffer lock each iteration,
    /// simulating work done on the protected bytes.
    pub hold_ms: u64,

    /// Sleep between iterations. The stop flag is only re-checked after this
    /// elapses, so it bounds shutdown latency. Must be nonzero.
    pub idle_ms: u64,

    /// Marker written into the shared buffer every iteration.
    pub sentinel: String,

    /// Status code the worker thread reports when asked to stop.
    pub exit_code: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            hold_ms: 1000,
            idle_ms: 100,
            sentinel: "DEADBEEF".to_string(),
            exit_code: 42,
        }
    }
}

impl WorkerConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

/// Device and controller section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identity name of the registered device record.
    pub name: String,

    /// Name the controller is configured to match against. Attach succeeds
    /// only when this equals the device name byte for byte.
    pub match_name: String,

    /// Delay between power_on and reset during attach, modeling hardware
    /// settling time.
    pub settle_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "e_device".to_string(),
            match_name: "e_device".to_string(),
            settle_ms: 5,
        }
    }
}

impl DeviceConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_export_name() -> String {
    "precious_data".to_string()
}

impl ModuleConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(content: &str) -> crate::error::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
