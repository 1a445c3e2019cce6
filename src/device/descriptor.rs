//! Device descriptors and hook capability sets.

use log::info;
use std::fmt;
use std::sync::Arc;

/// Lifecycle hook capabilities of a device.
///
/// Every method defaults to a no-op, so an implementation overrides only the
/// capabilities its hardware actually has; a missing hook is legal and is
/// simply skipped, never an error. Hooks are side-effecting and non-failing
/// by design, which is why none of them returns a `Result`.
pub trait DeviceHooks: Send + Sync {
    /// Bring the device up. Invoked during attach, before the settle delay.
    fn power_on(&self) {}

    /// Cut power. Invoked during detach.
    fn power_off(&self) {}

    /// Reset to a known state. Invoked during attach, after the settle delay.
    fn reset(&self) {}
}

/// Hook table with every capability left at the default no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl DeviceHooks for NoopHooks {}

/// Stock hook table that records each invocation in the log, for devices
/// that exist only to make their lifecycle observable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

impl DeviceHooks for LoggingHooks {
    fn power_on(&self) {
        info!("device: power_on()");
    }

    fn power_off(&self) {
        info!("device: power_off()");
    }

    fn reset(&self) {
        info!("device: reset()");
    }
}

/// Configuration attached to a device record: its hook capability set.
#[derive(Clone)]
pub struct DeviceConfiguration {
    hooks: Arc<dyn DeviceHooks>,
}

impl DeviceConfiguration {
    pub fn new(hooks: Arc<dyn DeviceHooks>) -> Self {
        Self { hooks }
    }

    /// Configuration whose hooks all do nothing.
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopHooks))
    }

    pub fn hooks(&self) -> &dyn DeviceHooks {
        self.hooks.as_ref()
    }
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for DeviceConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfiguration").finish_non_exhaustive()
    }
}

/// A named, matchable virtual device record.
///
/// Created once at module startup and destroyed at teardown. The record is
/// owned by whoever registered it; the controller only borrows it while
/// driving attach/detach.
#[derive(Debug, Clone)]
pub struct ManagedDeviceDescriptor {
    name: String,
    config: DeviceConfiguration,
}

impl ManagedDeviceDescriptor {
    pub fn new(name: impl Into<String>, config: DeviceConfiguration) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Identity name used for controller matching.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DeviceConfiguration {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHooks {
        on: AtomicU32,
    }

    impl DeviceHooks for CountingHooks {
        fn power_on(&self) {
            self.on.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_hooks_are_noops() {
        // Just exercising the defaults; nothing observable should happen.
        let config = DeviceConfiguration::noop();
        config.hooks().power_on();
        config.hooks().power_off();
        config.hooks().reset();
    }

    #[test]
    fn overridden_capability_runs_others_stay_noop() {
        let hooks = Arc::new(CountingHooks {
            on: AtomicU32::new(0),
        });
        let config = DeviceConfiguration::new(hooks.clone());

        config.hooks().power_on();
        config.hooks().reset();
        config.hooks().power_off();

        assert_eq!(hooks.on.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn descriptor_carries_identity() {
        let desc = ManagedDeviceDescriptor::new("e_device", DeviceConfiguration::noop());
        assert_eq!(desc.name(), "e_device");
    }
}
