//! Kcontrols: named, gettable/settable controls backed by register fields.
//!
//! Two payload families exist. A [`MixerControl`] is an integer field (a
//! volume, or a 0/1 switch gating a mixer input) with optional second channel.
//! An [`EnumControl`] is a selector whose items are named by `texts`; it gates
//! the input paths of a mux component.
//!
//! Controls owned by a component take part in power management: setting them
//! changes path connectivity and runs the sequencer. Controls added with
//! [`CardEngine::add_controls`](crate::CardEngine::add_controls) are plain
//! register controls.

use std::collections::HashMap;

use crate::device::DeviceKind;
use crate::error::{Result, SapmError};
use crate::graph::{ComponentId, PathId};

/// Integer register field, mono or stereo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MixerControl {
    /// Left (or only) channel register.
    pub reg: u32,
    /// Right channel register.
    pub rreg: u32,
    /// Left channel bit offset.
    pub shift: u32,
    /// Right channel bit offset.
    pub rshift: u32,
    /// Field mask.
    pub mask: u32,
    /// Lowest accepted value.
    pub min: u32,
    /// Highest accepted value.
    pub max: u32,
    /// Register holds `max - value`.
    pub invert: bool,
}

impl MixerControl {
    /// A mono field with range `0..=max`.
    pub fn new(reg: u32, shift: u32, mask: u32, max: u32) -> Self {
        Self {
            reg,
            rreg: reg,
            shift,
            rshift: shift,
            mask,
            min: 0,
            max,
            invert: false,
        }
    }

    /// A single-bit on/off switch.
    pub fn switch(reg: u32, shift: u32) -> Self {
        Self::new(reg, shift, 1, 1)
    }

    /// Sets the lowest accepted value.
    pub fn with_min(mut self, min: u32) -> Self {
        self.min = min;
        self
    }

    /// Stores values inverted.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Adds a right channel at `rreg`/`rshift`.
    pub fn stereo(mut self, rreg: u32, rshift: u32) -> Self {
        self.rreg = rreg;
        self.rshift = rshift;
        self
    }

    /// Whether the control has an independent right channel.
    pub fn is_stereo(&self) -> bool {
        self.reg != self.rreg || self.shift != self.rshift
    }

    /// Number of channels (1 or 2).
    pub fn channels(&self) -> usize {
        if self.is_stereo() { 2 } else { 1 }
    }

    /// Register and shift of a channel.
    pub(crate) fn channel(&self, channel: usize) -> (u32, u32) {
        if channel == 0 {
            (self.reg, self.shift)
        } else if self.reg == self.rreg {
            (self.rreg, self.rshift)
        } else {
            (self.rreg, self.shift)
        }
    }

    /// Converts a user value to its raw field value.
    pub(crate) fn encode(&self, value: u32) -> Result<u32> {
        if value < self.min || value > self.max {
            return Err(SapmError::InvalidParam(format!(
                "value {value} outside {}..={}",
                self.min, self.max
            )));
        }
        Ok(if self.invert { self.max - value } else { value })
    }

    /// Converts a raw field value back to a user value.
    pub(crate) fn decode(&self, field: u32) -> Result<u32> {
        if field > self.max {
            return Err(SapmError::InvalidParam(format!(
                "register field {field} exceeds max {}",
                self.max
            )));
        }
        Ok(if self.invert { self.max - field } else { field })
    }

    fn validate(&self) -> Result<()> {
        if self.shift >= 32 || self.rshift >= 32 {
            return Err(SapmError::InvalidParam("shift must be below 32".into()));
        }
        if self.mask == 0 {
            return Err(SapmError::InvalidParam("mask must be non-zero".into()));
        }
        if self.min > self.max {
            return Err(SapmError::InvalidParam(format!(
                "min {} greater than max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Enumerated selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumControl {
    /// Selector register (unused for virtual muxes).
    pub reg: u32,
    /// Bit offset of the selector field.
    pub shift: u32,
    /// Field mask.
    pub mask: u32,
    /// Item names; a mux input path connects when its name matches the
    /// selected item.
    pub texts: Vec<String>,
    /// Register value per item, for value muxes. `None` means the item index
    /// is the register value.
    pub values: Option<Vec<u32>>,
}

impl EnumControl {
    /// A selector whose field holds the item index.
    pub fn new<S: Into<String>>(reg: u32, shift: u32, mask: u32, texts: impl IntoIterator<Item = S>) -> Self {
        Self {
            reg,
            shift,
            mask,
            texts: texts.into_iter().map(Into::into).collect(),
            values: None,
        }
    }

    /// Maps each item to an explicit register value.
    pub fn with_values(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.values = Some(values.into_iter().collect());
        self
    }

    /// Item index selected by a raw field value.
    pub(crate) fn item_for_field(&self, field: u32) -> Option<usize> {
        match &self.values {
            Some(values) => values.iter().position(|v| *v == field),
            None => {
                let item = field as usize;
                (item < self.texts.len()).then_some(item)
            }
        }
    }

    /// Raw field value for an item index.
    pub(crate) fn field_for_item(&self, item: usize) -> u32 {
        match &self.values {
            Some(values) => values.get(item).copied().unwrap_or(0),
            None => item as u32,
        }
    }

    pub(crate) fn item_count(&self) -> usize {
        self.texts.len()
    }

    fn validate(&self) -> Result<()> {
        if self.texts.is_empty() {
            return Err(SapmError::InvalidParam("enum control has no items".into()));
        }
        if self.shift >= 32 {
            return Err(SapmError::InvalidParam("shift must be below 32".into()));
        }
        if let Some(values) = &self.values {
            if values.len() != self.texts.len() {
                return Err(SapmError::InvalidParam(format!(
                    "{} values for {} items",
                    values.len(),
                    self.texts.len()
                )));
            }
        }
        Ok(())
    }
}

/// Control payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlKind {
    /// Integer field.
    Mixer(MixerControl),
    /// Enumerated selector.
    Enum(EnumControl),
}

/// Declarative description of one control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlDescriptor {
    /// Control name, unique on the card.
    pub name: String,
    /// Payload.
    pub kind: ControlKind,
    /// Backend for free-standing controls. Controls owned by a component
    /// always use the component's device.
    pub device: DeviceKind,
}

impl ControlDescriptor {
    /// An integer control.
    pub fn mixer(name: impl Into<String>, control: MixerControl) -> Self {
        Self {
            name: name.into(),
            kind: ControlKind::Mixer(control),
            device: DeviceKind::Codec,
        }
    }

    /// An enumerated control.
    pub fn enumerated(name: impl Into<String>, control: EnumControl) -> Self {
        Self {
            name: name.into(),
            kind: ControlKind::Enum(control),
            device: DeviceKind::Codec,
        }
    }

    /// Binds a free-standing control to the accessory.
    pub fn on_accessory(mut self) -> Self {
        self.device = DeviceKind::Accessory;
        self
    }

    /// Checks ranges and field geometry.
    pub fn validate(&self) -> Result<()> {
        let res = match &self.kind {
            ControlKind::Mixer(mixer) => mixer.validate(),
            ControlKind::Enum(en) => en.validate(),
        };
        res.map_err(|e| match e {
            SapmError::InvalidParam(msg) => SapmError::InvalidParam(format!("control '{}': {msg}", self.name)),
            other => other,
        })
    }
}

/// Value type reported by [`ControlInfo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlType {
    /// 0/1 switch.
    Boolean,
    /// Integer range.
    Integer,
    /// Item index of an enumerated selector.
    Enumerated,
}

/// Static description of a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlInfo {
    /// Number of values (channels).
    pub count: u32,
    /// Value type.
    pub control_type: ControlType,
    /// Lowest value.
    pub min: u32,
    /// Highest value.
    pub max: u32,
}

/// A control registered on the card.
pub(crate) struct Kcontrol {
    pub name: String,
    pub kind: ControlKind,
    pub device: DeviceKind,
    /// Components owning the control; empty for plain controls.
    pub owners: Vec<ComponentId>,
    /// Paths this control gates.
    pub paths: Vec<PathId>,
    /// Selected item of a virtual mux.
    pub selection: usize,
}

impl Kcontrol {
    pub fn info(&self) -> ControlInfo {
        match &self.kind {
            ControlKind::Mixer(mixer) => ControlInfo {
                count: mixer.channels() as u32,
                control_type: if mixer.min == 0 && mixer.max == 1 {
                    ControlType::Boolean
                } else {
                    ControlType::Integer
                },
                min: mixer.min,
                max: mixer.max,
            },
            ControlKind::Enum(en) => ControlInfo {
                count: 1,
                control_type: ControlType::Enumerated,
                min: 0,
                max: en.item_count().saturating_sub(1) as u32,
            },
        }
    }

    pub fn is_power_managed(&self) -> bool {
        !self.owners.is_empty()
    }
}

/// Name-indexed storage for a card's controls.
#[derive(Default)]
pub(crate) struct ControlStore {
    controls: Vec<Kcontrol>,
    by_name: HashMap<String, usize>,
}

impl ControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `desc` can be registered: the name is free, or already
    /// holds an identical control on the same device.
    pub fn check(&self, desc: &ControlDescriptor, device: DeviceKind) -> Result<()> {
        match self.by_name.get(&desc.name) {
            Some(idx) => {
                let existing = &self.controls[*idx];
                if existing.kind == desc.kind && existing.device == device {
                    Ok(())
                } else {
                    Err(SapmError::Duplicate(format!("control '{}'", desc.name)))
                }
            }
            None => Ok(()),
        }
    }

    /// Reserves room for `additional` new controls.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.controls
            .try_reserve(additional)
            .map_err(|_| SapmError::AllocFail)?;
        self.by_name
            .try_reserve(additional)
            .map_err(|_| SapmError::AllocFail)
    }

    /// Inserts a control already accepted by [`check`](Self::check), into
    /// room made by [`reserve`](Self::reserve).
    pub fn insert(&mut self, desc: &ControlDescriptor, device: DeviceKind, owner: Option<ComponentId>) -> usize {
        let idx = match self.by_name.get(&desc.name) {
            Some(idx) => *idx,
            None => {
                let idx = self.controls.len();
                self.controls.push(Kcontrol {
                    name: desc.name.clone(),
                    kind: desc.kind.clone(),
                    device,
                    owners: Vec::new(),
                    paths: Vec::new(),
                    selection: 0,
                });
                self.by_name.insert(desc.name.clone(), idx);
                idx
            }
        };
        if let Some(owner) = owner {
            let owners = &mut self.controls[idx].owners;
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        idx
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<usize> {
        self.lookup(name)
            .ok_or_else(|| SapmError::control_not_found(name))
    }

    pub fn get(&self, idx: usize) -> &Kcontrol {
        &self.controls[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Kcontrol {
        &mut self.controls[idx]
    }

    pub fn names(&self) -> Vec<String> {
        self.controls.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }
}
