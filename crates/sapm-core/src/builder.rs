//! Component builder.
//!
//! Descriptors are validated as a whole batch before anything is inserted,
//! so a rejected batch leaves the card untouched.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::card::CardState;
use crate::control::{ControlDescriptor, ControlKind};
use crate::device::DeviceKind;
use crate::error::{Result, SapmError};
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::kind::{ComponentKind, ControlFamily};

impl CardState {
    pub(crate) fn new_components(&mut self, descs: &[ComponentDescriptor]) -> Result<Vec<ComponentId>> {
        self.check_components(descs)?;
        self.graph.reserve_components(descs.len())?;
        self.controls
            .reserve(descs.iter().map(|d| d.controls.len()).sum())?;

        // Nothing below can fail.
        let mut ids = Vec::new();
        ids.try_reserve(descs.len()).map_err(|_| SapmError::AllocFail)?;
        for desc in descs {
            let id = self.graph.insert_component(desc);
            for control in &desc.controls {
                let idx = self.controls.insert(control, desc.device, Some(id));
                self.graph.component_mut(id).controls.push(idx);
            }
            if self.live {
                self.dirty.insert(id);
            }
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn add_controls(&mut self, descs: &[ControlDescriptor]) -> Result<()> {
        let mut batch: HashMap<&str, &ControlDescriptor> = HashMap::new();
        for desc in descs {
            desc.validate()?;
            if !self.devices.has(desc.device) {
                return Err(SapmError::InvalidObject(format!(
                    "control '{}' needs a {} device",
                    desc.name, desc.device
                )));
            }
            self.controls.check(desc, desc.device)?;
            if let Some(prev) = batch.insert(desc.name.as_str(), desc) {
                if prev != desc {
                    return Err(SapmError::Duplicate(format!("control '{}'", desc.name)));
                }
            }
        }
        self.controls.reserve(descs.len())?;
        for desc in descs {
            self.controls.insert(desc, desc.device, None);
            debug!(control = %desc.name, device = %desc.device, "control added");
        }
        Ok(())
    }

    fn check_components(&self, descs: &[ComponentDescriptor]) -> Result<()> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut controls: HashMap<&str, (&ControlKind, DeviceKind)> = HashMap::new();

        for desc in descs {
            if desc.name.is_empty() {
                return Err(SapmError::InvalidParam("component name is empty".into()));
            }
            if self.graph.contains(&desc.name) || !names.insert(desc.name.as_str()) {
                return Err(SapmError::Duplicate(format!("component '{}'", desc.name)));
            }
            if let Some(reg) = desc.register {
                if reg.shift >= 32 || reg.mask == 0 {
                    return Err(SapmError::InvalidParam(format!(
                        "component '{}': bad power field (shift {}, mask {:#x})",
                        desc.name, reg.shift, reg.mask
                    )));
                }
            }
            if needs_device(desc) && !self.devices.has(desc.device) {
                return Err(SapmError::InvalidObject(format!(
                    "component '{}' needs a {} device",
                    desc.name, desc.device
                )));
            }
            check_control_family(desc)?;

            for control in &desc.controls {
                control.validate()?;
                self.controls.check(control, desc.device)?;
                if let Some((kind, device)) = controls.insert(control.name.as_str(), (&control.kind, desc.device)) {
                    if *kind != control.kind || device != desc.device {
                        return Err(SapmError::Duplicate(format!("control '{}'", control.name)));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Whether a descriptor touches registers at all.
fn needs_device(desc: &ComponentDescriptor) -> bool {
    desc.register.is_some()
        || (desc.kind != ComponentKind::VirtMux && !desc.controls.is_empty())
}

fn check_control_family(desc: &ComponentDescriptor) -> Result<()> {
    let bad = |msg: String| Err(SapmError::InvalidParam(format!("component '{}': {msg}", desc.name)));
    match desc.kind.control_family() {
        ControlFamily::Mux => {
            if desc.controls.len() != 1 {
                return bad(format!("{} needs exactly one enum control, got {}", desc.kind, desc.controls.len()));
            }
            if !matches!(desc.controls[0].kind, ControlKind::Enum(_)) {
                return bad(format!("{} control must be enumerated", desc.kind));
            }
        }
        ControlFamily::Mixer => {
            if desc.controls.iter().any(|c| !matches!(c.kind, ControlKind::Mixer(_))) {
                return bad(format!("{} controls must be mixer switches", desc.kind));
            }
        }
        ControlFamily::Plain => {
            if !desc.controls.is_empty() {
                return bad(format!("{} cannot own controls", desc.kind));
            }
        }
    }
    Ok(())
}
