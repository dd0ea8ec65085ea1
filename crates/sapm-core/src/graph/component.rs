//! Component (widget) types.
//!
//! A [`ComponentDescriptor`] is the declarative table entry a card is built
//! from; the engine deep-copies it into an internal `Component` that also
//! carries power bookkeeping and adjacency. Components are addressed by a
//! stable [`ComponentId`] for the lifetime of the card.

use crate::control::ControlDescriptor;
use crate::device::DeviceKind;
use crate::kind::{ComponentKind, PowerCheck};

use super::path::PathId;

/// Unique identifier for a component on one card.
///
/// Ids are assigned sequentially and never reused; components live until the
/// card is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Power state of a component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Powered down.
    #[default]
    Down,
    /// Powered up.
    Up,
}

impl PowerState {
    /// Returns `true` when powered up.
    #[inline]
    pub fn is_up(self) -> bool {
        self == PowerState::Up
    }

    /// Builds a state from a boolean "on" flag.
    #[inline]
    pub fn from_on(on: bool) -> Self {
        if on { PowerState::Up } else { PowerState::Down }
    }
}

impl core::fmt::Display for PowerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PowerState::Down => "down",
            PowerState::Up => "up",
        })
    }
}

/// Location of a component's power bit field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterCtrl {
    /// Register address.
    pub reg: u32,
    /// Bit offset of the field.
    pub shift: u32,
    /// Field mask (applied after shifting down).
    pub mask: u32,
    /// Field reads as zero when the component is powered.
    pub invert: bool,
}

impl RegisterCtrl {
    /// A single power bit at `reg`/`shift`.
    pub fn bit(reg: u32, shift: u32) -> Self {
        Self {
            reg,
            shift,
            mask: 1,
            invert: false,
        }
    }

    /// Field value that represents `power`: 1 when the field is on, 0 when
    /// it is off, whatever the mask width.
    pub fn field_for(&self, power: PowerState) -> u32 {
        let on = power.is_up() != self.invert;
        u32::from(on)
    }

    /// Decodes a power state from a full register value.
    pub fn decode(&self, reg_value: u32) -> PowerState {
        let field = (reg_value >> self.shift) & self.mask;
        PowerState::from_on((field != 0) != self.invert)
    }
}

/// Declarative description of one component.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDescriptor {
    /// Widget kind.
    pub kind: ComponentKind,
    /// Name, unique on the card.
    pub name: String,
    /// Power bit field, `None` for components without one.
    pub register: Option<RegisterCtrl>,
    /// Backend the power register (and owned controls) live on.
    pub device: DeviceKind,
    /// Stream this endpoint belongs to (DAC/ADC/AIF only).
    pub stream: Option<String>,
    /// Controls owned by this component.
    pub controls: Vec<ControlDescriptor>,
}

impl ComponentDescriptor {
    /// A component without a power register, bound to the codec.
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            register: None,
            device: DeviceKind::Codec,
            stream: None,
            controls: Vec::new(),
        }
    }

    /// Sets a single-bit power register.
    pub fn with_register(mut self, reg: u32, shift: u32) -> Self {
        self.register = Some(RegisterCtrl::bit(reg, shift));
        self
    }

    /// Sets an arbitrary power register field.
    pub fn with_register_ctrl(mut self, ctrl: RegisterCtrl) -> Self {
        self.register = Some(ctrl);
        self
    }

    /// Marks the power bit as active-low.
    pub fn inverted(mut self) -> Self {
        if let Some(reg) = self.register.as_mut() {
            reg.invert = true;
        }
        self
    }

    /// Binds the component to the accessory backend.
    pub fn on_accessory(mut self) -> Self {
        self.device = DeviceKind::Accessory;
        self
    }

    /// Associates the endpoint with a stream name.
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    /// Adds an owned control.
    pub fn with_control(mut self, control: ControlDescriptor) -> Self {
        self.controls.push(control);
        self
    }
}

/// Invoked to gate or ungate a component's clock around idle collapse.
pub type ClockHook = Box<dyn FnMut(ClockGate) -> Result<(), crate::error::BusError> + Send>;

/// Direction of a clock hook call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockGate {
    /// Stop the clock (card entering standby).
    Gate,
    /// Restart the clock (card leaving standby).
    Ungate,
}

/// Internal bookkeeping for a component on the card.
pub(crate) struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    pub name: String,
    pub register: Option<RegisterCtrl>,
    pub device: DeviceKind,
    pub stream: Option<String>,
    pub check: PowerCheck,
    pub power: PowerState,
    /// Last value produced by the power check.
    pub requested_power: PowerState,
    /// A stream is running through this endpoint.
    pub active: bool,
    /// Adjacent to an off-chip pin.
    pub external: bool,
    /// Controls this component owns, by card control index.
    pub controls: Vec<usize>,
    /// Paths arriving at this component (it is their sink).
    pub sources: Vec<PathId>,
    /// Paths leaving this component (it is their source).
    pub sinks: Vec<PathId>,
    pub clock_hook: Option<ClockHook>,
}

impl Component {
    pub fn from_descriptor(id: ComponentId, desc: &ComponentDescriptor) -> Self {
        Self {
            id,
            kind: desc.kind,
            name: desc.name.clone(),
            register: desc.register,
            device: desc.device,
            stream: desc.stream.clone(),
            check: desc.kind.power_check(),
            power: PowerState::Down,
            requested_power: PowerState::Down,
            active: false,
            external: false,
            controls: Vec::new(),
            sources: Vec::new(),
            sinks: Vec::new(),
            clock_hook: None,
        }
    }

    pub fn info(&self) -> ComponentInfo {
        ComponentInfo {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            power: self.power,
            requested_power: self.requested_power,
            active: self.active,
            external: self.external,
            register: self.register,
            device: self.device,
            stream: self.stream.clone(),
        }
    }
}

/// Snapshot of a component for introspection.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentInfo {
    /// Component id.
    pub id: ComponentId,
    /// Component name.
    pub name: String,
    /// Widget kind.
    pub kind: ComponentKind,
    /// Current power state.
    pub power: PowerState,
    /// Last computed target state.
    pub requested_power: PowerState,
    /// Stream running through the endpoint.
    pub active: bool,
    /// Adjacent to an off-chip pin.
    pub external: bool,
    /// Power register field, if any.
    pub register: Option<RegisterCtrl>,
    /// Backend the component is bound to.
    pub device: DeviceKind,
    /// Stream name, if any.
    pub stream: Option<String>,
}
