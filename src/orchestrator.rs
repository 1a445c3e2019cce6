//! Module lifecycle orchestration.
//!
//! The orchestrator sequences the module's four startup steps in a fixed
//! order (control surface, background worker, device registration,
//! controller attach) and unwinds them in reverse, releasing each acquired
//! resource exactly once. Two properties drive the design:
//!
//! - On failure at step k, only steps 1..k-1 are released; a step that
//!   never ran is never released.
//! - Teardown unwinds unconditionally, so it must track per step whether
//!   the resource was actually acquired, independent of whether startup as
//!   a whole succeeded. Acquired resources live in `Option`s and are
//!   `take()`n on release, which also makes a second teardown a no-op.
//!
//! The shared buffer sits outside the four steps: it is published before
//! step 1 and revoked after the last release, because an independently
//! started peer may still hold a binding when the worker stops.
//!
//! Every acquire and release is recorded in an in-memory journal so the
//! rollback behavior stays observable after the fact.

use crate::config::ModuleConfig;
use crate::device::{
    AttachOutcome, DeviceConfiguration, DeviceController, DeviceId, DeviceRegistry, LoggingHooks,
    ManagedDeviceDescriptor,
};
use crate::error::{Result, VdevError};
use crate::memory::{marker_from_bytes, write_marker_bytes, ExportTable, SharedBuffer};
use crate::surface::{AccessMode, ControlSurface, EntryId, RAW_BUFFER_CAPACITY};
use crate::worker::{WorkerHandle, WorkerState};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the module's worker thread.
pub const WORKER_NAME: &str = "e_thread";
/// Raw buffer entry under the surface root.
pub const CUSTOM_VALUE_ENTRY: &str = "custom_value";
/// Boolean entry under the surface root.
pub const BOOLVAL_ENTRY: &str = "boolval";

/// Module lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Idle,
    SurfaceUp,
    WorkerRunning,
    DeviceRegistered,
    Attached,
    Ready,
    Failed,
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleState::Idle => "Idle",
            ModuleState::SurfaceUp => "SurfaceUp",
            ModuleState::WorkerRunning => "WorkerRunning",
            ModuleState::DeviceRegistered => "DeviceRegistered",
            ModuleState::Attached => "Attached",
            ModuleState::Ready => "Ready",
            ModuleState::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// The four orchestrated startup steps, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupStep {
    Surface,
    Worker,
    Device,
    Attach,
}

impl std::fmt::Display for StartupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StartupStep::Surface => "surface",
            StartupStep::Worker => "worker",
            StartupStep::Device => "device",
            StartupStep::Attach => "attach",
        };
        write!(f, "{}", s)
    }
}

/// Recorded lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Shared buffer published under its export name.
    ExportPublished { name: String },
    /// A startup step acquired its resource.
    Acquired { step: StartupStep },
    /// A startup step's resource was released.
    Released { step: StartupStep },
    /// Startup aborted at this step; the unwind follows.
    StartupFailed { step: StartupStep, error: String },
    /// Shared-buffer export withdrawn. Always the final event of a
    /// teardown or failed startup.
    ExportRevoked { name: String },
}

/// Handles to the module's control-surface entries.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHandles {
    pub root: EntryId,
    pub custom_value: EntryId,
    pub boolval: EntryId,
}

/// Drives module startup and teardown.
pub struct ModuleOrchestrator {
    config: ModuleConfig,
    controller: DeviceController,
    device_config: DeviceConfiguration,
    state: ModuleState,
    shared: SharedBuffer,
    exports: ExportTable,
    journal: Vec<LifecycleEvent>,

    // Per-step acquisition tracking. `Some`/true means the step's resource
    // is currently held and must be released exactly once.
    surface: Option<(ControlSurface, SurfaceHandles)>,
    worker: Option<WorkerHandle>,
    device: Option<DeviceId>,
    attached: bool,

    registry: DeviceRegistry,
}

impl ModuleOrchestrator {
    /// Create an orchestrator with the stock logging hook table.
    pub fn new(config: ModuleConfig) -> Self {
        Self::with_device_configuration(config, DeviceConfiguration::new(Arc::new(LoggingHooks)))
    }

    /// Create an orchestrator with a caller-supplied hook table.
    pub fn with_device_configuration(
        config: ModuleConfig,
        device_config: DeviceConfiguration,
    ) -> Self {
        let controller =
            DeviceController::new(config.device.match_name.as_str(), config.device.settle());
        Self {
            config,
            controller,
            device_config,
            state: ModuleState::Idle,
            shared: SharedBuffer::new(),
            exports: ExportTable::new(),
            journal: Vec::new(),
            surface: None,
            worker: None,
            device: None,
            attached: false,
            registry: DeviceRegistry::new(),
        }
    }

    /// Run the four startup steps in order.
    ///
    /// On failure at any step the already-acquired steps are unwound in
    /// reverse before the error is returned, leaving no partially created
    /// resources behind; the orchestrator ends in `Failed`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ModuleState::Idle {
            return Err(VdevError::invalid_input(format!(
                "cannot start from state {}",
                self.state
            )));
        }

        // Published ahead of the steps; lives until the final revoke.
        if !self.exports.is_published(&self.config.export) {
            self.exports
                .publish(&self.config.export, self.shared.clone())?;
            self.journal.push(LifecycleEvent::ExportPublished {
                name: self.config.export.clone(),
            });
        }

        // Step 1: control surface.
        match self.build_surface() {
            Ok(bundle) => {
                self.surface = Some(bundle);
                self.state = ModuleState::SurfaceUp;
                self.record_acquired(StartupStep::Surface);
            }
            Err(e) => return Err(self.fail_startup(StartupStep::Surface, e)),
        }

        // Step 2: background worker.
        match self.spawn_worker() {
            Ok(handle) => {
                self.worker = Some(handle);
                self.state = ModuleState::WorkerRunning;
                self.record_acquired(StartupStep::Worker);
            }
            Err(e) => return Err(self.fail_startup(StartupStep::Worker, e)),
        }

        // Step 3: device registration.
        let descriptor = ManagedDeviceDescriptor::new(
            self.config.device.name.clone(),
            self.device_config.clone(),
        );
        match self.registry.register(descriptor.clone()) {
            Ok(id) => {
                self.device = Some(id);
                self.state = ModuleState::DeviceRegistered;
                self.record_acquired(StartupStep::Device);
            }
            Err(e) => return Err(self.fail_startup(StartupStep::Device, e)),
        }

        // Step 4: controller attach. An unmatched device cannot be driven,
        // which makes NoMatch fatal here even though the controller itself
        // reports it as a plain outcome.
        match self.controller.attach(&descriptor) {
            AttachOutcome::Attached => {
                self.attached = true;
                self.state = ModuleState::Attached;
                self.record_acquired(StartupStep::Attach);
            }
            AttachOutcome::NoMatch => {
                let err = VdevError::NoMatch {
                    device: descriptor.name().to_string(),
                    match_name: self.controller.match_name().to_string(),
                };
                return Err(self.fail_startup(StartupStep::Attach, err));
            }
        }

        self.state = ModuleState::Ready;
        info!("module ready");
        Ok(())
    }

    /// Normal shutdown.
    ///
    /// Unwinds all steps in reverse order unconditionally; steps that were
    /// never acquired (or were already released) are skipped by the
    /// per-step tracking, so repeated teardown releases nothing twice. The
    /// export is revoked last. Afterwards the orchestrator is back in
    /// `Idle` and may be started again.
    pub fn teardown(&mut self) {
        info!("module teardown from state {}", self.state);
        self.unwind();
        self.state = ModuleState::Idle;
    }

    fn unwind(&mut self) {
        self.release_attach();
        self.release_device();
        self.release_worker();
        self.release_surface();
        self.revoke_export();
    }

    fn fail_startup(&mut self, step: StartupStep, err: VdevError) -> VdevError {
        error!("startup failed at step '{}': {}", step, err);
        self.journal.push(LifecycleEvent::StartupFailed {
            step,
            error: err.to_string(),
        });
        self.unwind();
        self.state = ModuleState::Failed;
        err
    }

    fn record_acquired(&mut self, step: StartupStep) {
        debug!("acquired step '{}'", step);
        self.journal.push(LifecycleEvent::Acquired { step });
    }

    fn record_released(&mut self, step: StartupStep) {
        debug!("released step '{}'", step);
        self.journal.push(LifecycleEvent::Released { step });
    }

    fn build_surface(&self) -> Result<(ControlSurface, SurfaceHandles)> {
        let mut surface = ControlSurface::new();
        let root = surface.create_root(&self.config.surface.root)?;

        let custom_value = match surface.attach_raw_buffer(
            root,
            CUSTOM_VALUE_ENTRY,
            AccessMode::ReadWrite,
            RAW_BUFFER_CAPACITY,
        ) {
            Ok(id) => id,
            Err(e) => {
                // Only the root exists at this point.
                if let Err(cleanup) = surface.remove(root) {
                    warn!("surface rollback: {}", cleanup);
                }
                return Err(e);
            }
        };

        let boolval = match surface.attach_boolean(root, BOOLVAL_ENTRY, AccessMode::ReadWrite) {
            Ok(id) => id,
            Err(e) => {
                // Unwind what was attached, leaves before the root.
                for id in [custom_value, root] {
                    if let Err(cleanup) = surface.remove(id) {
                        warn!("surface rollback: {}", cleanup);
                    }
                }
                return Err(e);
            }
        };

        Ok((
            surface,
            SurfaceHandles {
                root,
                custom_value,
                boolval,
            },
        ))
    }

    fn spawn_worker(&self) -> Result<WorkerHandle> {
        let shared = self.shared.clone();
        let sentinel = self.config.worker.sentinel.clone();
        let hold = self.config.worker.hold();

        WorkerHandle::spawn(
            WORKER_NAME,
            self.config.worker.idle(),
            self.config.worker.exit_code,
            move || {
                shared.with_lock(|bytes| {
                    debug!("{}: lock held, found '{}'", WORKER_NAME, marker_from_bytes(bytes));
                    write_marker_bytes(bytes, &sentinel);
                    // The lock stays held across the simulated work; this
                    // is the window a peer consumer contends on.
                    std::thread::sleep(hold);
                });
                Ok(())
            },
        )
    }

    fn release_attach(&mut self) {
        if !self.attached {
            return;
        }
        if let Some(id) = self.device {
            if let Some(descriptor) = self.registry.get(id) {
                self.controller.detach(descriptor);
            }
        }
        self.attached = false;
        self.record_released(StartupStep::Attach);
    }

    fn release_device(&mut self) {
        if let Some(id) = self.device.take() {
            self.registry.unregister(id);
            self.record_released(StartupStep::Device);
        }
    }

    fn release_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.request_stop() {
                Ok(code) => info!("worker exited with code {}", code),
                Err(e) => error!("worker stop failed: {}", e),
            }
            self.record_released(StartupStep::Worker);
        }
    }

    fn release_surface(&mut self) {
        if let Some((mut surface, handles)) = self.surface.take() {
            // Leaf entries first, the root last.
            for id in [handles.boolval, handles.custom_value, handles.root] {
                if let Err(e) = surface.remove(id) {
                    warn!("surface teardown: {}", e);
                }
            }
            self.record_released(StartupStep::Surface);
        }
    }

    fn revoke_export(&mut self) {
        if self.exports.revoke(&self.config.export) {
            self.journal.push(LifecycleEvent::ExportRevoked {
                name: self.config.export.clone(),
            });
        }
    }

    // Observers.

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Handle to the export table, for handing to peer components.
    pub fn exports(&self) -> ExportTable {
        self.exports.clone()
    }

    /// Handle to the shared buffer itself.
    pub fn shared_buffer(&self) -> SharedBuffer {
        self.shared.clone()
    }

    /// The control surface, while the module is up.
    pub fn control_surface(&self) -> Option<&ControlSurface> {
        self.surface.as_ref().map(|(s, _)| s)
    }

    pub fn control_surface_mut(&mut self) -> Option<&mut ControlSurface> {
        self.surface.as_mut().map(|(s, _)| s)
    }

    pub fn surface_handles(&self) -> Option<SurfaceHandles> {
        self.surface.as_ref().map(|(_, h)| *h)
    }

    /// State of the worker thread, while one exists.
    pub fn worker_state(&self) -> Option<WorkerState> {
        self.worker.as_ref().map(|w| w.state())
    }

    pub fn device_registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Recorded lifecycle events, oldest first.
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.journal
    }

    /// Journal rendered as JSON, for dumping alongside logs.
    pub fn events_json(&self) -> String {
        serde_json::to_string_pretty(&self.journal).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Drop for ModuleOrchestrator {
    fn drop(&mut self) {
        // Resources unwind in the same order as an explicit teardown.
        self.unwind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> ModuleConfig {
        let mut config = ModuleConfig::default();
        config.worker.hold_ms = 2;
        config.worker.idle_ms = 2;
        config.device.settle_ms = 1;
        config
    }

    #[test]
    fn start_reaches_ready_and_teardown_returns_to_idle() {
        let mut module = ModuleOrchestrator::new(fast_config());
        assert_eq!(module.state(), ModuleState::Idle);

        module.start().unwrap();
        assert_eq!(module.state(), ModuleState::Ready);
        assert_eq!(module.worker_state(), Some(WorkerState::Running));
        assert_eq!(module.device_registry().len(), 1);
        assert!(module.exports().is_published("precious_data"));

        module.teardown();
        assert_eq!(module.state(), ModuleState::Idle);
        assert!(module.worker_state().is_none());
        assert!(module.device_registry().is_empty());
        assert!(!module.exports().is_published("precious_data"));
    }

    #[test]
    fn journal_records_acquisitions_in_order() {
        let mut module = ModuleOrchestrator::new(fast_config());
        module.start().unwrap();

        let steps: Vec<_> = module
            .events()
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Acquired { step } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                StartupStep::Surface,
                StartupStep::Worker,
                StartupStep::Device,
                StartupStep::Attach
            ]
        );

        module.teardown();
        let released: Vec<_> = module
            .events()
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Released { step } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(
            released,
            vec![
                StartupStep::Attach,
                StartupStep::Device,
                StartupStep::Worker,
                StartupStep::Surface
            ]
        );

        // The export goes away last.
        assert!(matches!(
            module.events().last(),
            Some(LifecycleEvent::ExportRevoked { .. })
        ));
    }

    #[test]
    fn surface_entries_exist_while_ready() {
        let mut module = ModuleOrchestrator::new(fast_config());
        module.start().unwrap();

        let handles = module.surface_handles().unwrap();
        let surface = module.control_surface().unwrap();
        assert_eq!(
            surface.list(handles.root).unwrap(),
            vec![CUSTOM_VALUE_ENTRY, BOOLVAL_ENTRY]
        );
        module.teardown();
    }

    #[test]
    fn worker_writes_sentinel_into_shared_buffer() {
        let mut module = ModuleOrchestrator::new(fast_config());
        module.start().unwrap();
        let shared = module.shared_buffer();

        std::thread::sleep(std::time::Duration::from_millis(30));
        assert_eq!(shared.read_marker(), "DEADBEEF");
        module.teardown();
    }

    #[test]
    fn start_from_ready_is_rejected() {
        let mut module = ModuleOrchestrator::new(fast_config());
        module.start().unwrap();
        assert!(module.start().is_err());
        module.teardown();
    }

    #[test]
    fn events_json_is_valid() {
        let mut module = ModuleOrchestrator::new(fast_config());
        module.start().unwrap();
        module.teardown();

        let parsed: serde_json::Value = serde_json::from_str(&module.events_json()).unwrap();
        assert!(parsed.as_array().map(|a| !a.is_empty()).unwrap_or(false));
    }
}
