//! Device lifecycle controller.

use crate::device::descriptor::ManagedDeviceDescriptor;
use log::{debug, info};
use std::time::Duration;

/// Result of an attach attempt.
///
/// `NoMatch` is an outcome, not an error: the controller simply was not the
/// right one for this descriptor. Callers decide whether that is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Name matched; hooks ran; the device is attached.
    Attached,
    /// Name did not match; no hook was invoked.
    NoMatch,
}

/// Matches device records by name and drives their lifecycle.
#[derive(Debug, Clone)]
pub struct DeviceController {
    match_name: String,
    settle: Duration,
}

impl DeviceController {
    /// `match_name` is compared byte for byte against descriptor identities.
    /// `settle` is the delay between power_on and reset during attach,
    /// modeling hardware settling time.
    pub fn new(match_name: impl Into<String>, settle: Duration) -> Self {
        Self {
            match_name: match_name.into(),
            settle,
        }
    }

    pub fn match_name(&self) -> &str {
        &self.match_name
    }

    /// Attach to a descriptor.
    ///
    /// On a byte-for-byte name match: power_on, wait the settle interval,
    /// reset, and report `Attached`. Hook failures are not modeled; once
    /// matched, attach always succeeds. On a mismatch, `NoMatch` is reported
    /// and no hook runs.
    pub fn attach(&self, descriptor: &ManagedDeviceDescriptor) -> AttachOutcome {
        if descriptor.name().as_bytes() != self.match_name.as_bytes() {
            debug!(
                "controller '{}': no match for device '{}'",
                self.match_name,
                descriptor.name()
            );
            return AttachOutcome::NoMatch;
        }

        info!("controller '{}': attaching", self.match_name);
        let hooks = descriptor.config().hooks();
        hooks.power_on();
        std::thread::sleep(self.settle);
        hooks.reset();
        AttachOutcome::Attached
    }

    /// Detach from a descriptor: power_off. Always succeeds.
    pub fn detach(&self, descriptor: &ManagedDeviceDescriptor) {
        info!("controller '{}': detaching", self.match_name);
        descriptor.config().hooks().power_off();
    }
}
