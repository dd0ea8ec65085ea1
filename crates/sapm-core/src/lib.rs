//! SAPM Core - sound audio power management engine
//!
//! This crate decides which power domains of an audio codec must be on for
//! the routes currently in use, and in what order to switch them.
//!
//! # Core Abstractions
//!
//! ## Graph
//!
//! - [`ComponentDescriptor`] - Declarative widget entry (DAC, mixer, PGA, speaker, ...)
//! - [`Route`] - Declarative `{sink, control, source}` route entry
//! - [`ComponentKind`] - Closed set of widget kinds with their phase tables
//!
//! ## Controls
//!
//! - [`MixerControl`] - Integer/switch register field, mono or stereo
//! - [`EnumControl`] - Mux selector
//! - [`ControlDescriptor`] - Named control bound to a component or the card
//!
//! ## Engine
//!
//! - [`CardEngine`] - One card: graph, controls, dirty set, sequencer, idle timer
//! - [`PowerReport`] - Transitions executed by one sequencer pass
//! - [`IdleConfig`] / [`IdleOutcome`] - Idle power collapse
//!
//! ## Register backends
//!
//! - [`RegisterIo`] - Read/write contract implemented by codec drivers
//! - [`Device`] - Backend plus its register lock
//! - [`MemoryRegisters`] - In-memory register map with a write log
//!
//! # Example
//!
//! ```rust
//! use sapm_core::{
//!     CardEngine, ComponentDescriptor, ComponentKind, ControlDescriptor, Device,
//!     MemoryRegisters, MixerControl, Route,
//! };
//!
//! let regs = MemoryRegisters::new();
//! let card = CardEngine::new("demo", Some(Device::codec(regs.clone())), None);
//! card.new_components(&[
//!     ComponentDescriptor::new(ComponentKind::Dac, "DACL").with_register(0x14, 11),
//!     ComponentDescriptor::new(ComponentKind::Speaker, "SPKL").with_control(
//!         ControlDescriptor::mixer("Dacl enable", MixerControl::switch(0x30, 27)),
//!     ),
//! ])?;
//! card.add_route(&Route::gated("SPKL", "Dacl enable", "DACL"))?;
//! card.new_controls()?;
//! card.set_power_monitor(false)?;
//!
//! let report = card.control_set("Dacl enable", &[1])?;
//! assert_eq!(report.powered_up, vec!["DACL", "SPKL"]);
//! # Ok::<(), sapm_core::SapmError>(())
//! ```

mod bridge;
mod builder;
pub mod card;
pub mod control;
pub mod device;
pub mod error;
pub mod graph;
pub mod idle;
pub mod kind;
pub mod memory;
pub mod route;
pub mod sequencer;

pub use card::{CardEngine, StreamOp};
pub use control::{ControlDescriptor, ControlInfo, ControlKind, ControlType, EnumControl, MixerControl};
pub use device::{Device, DeviceKind, RegisterIo};
pub use error::{BusError, Result, SapmError};
pub use graph::{
    ClockGate, ClockHook, ComponentDescriptor, ComponentId, ComponentInfo, PathId, PathInfo,
    PowerState, RegisterCtrl,
};
pub use idle::{DEFAULT_POLL_INTERVAL, DEFAULT_SLEEP_THRESHOLD, IdleConfig, IdleOutcome};
pub use kind::{ALL_KINDS, ComponentKind, ControlFamily, PowerCheck};
pub use memory::{MemoryRegisters, RegisterWrite};
pub use route::Route;
pub use sequencer::PowerReport;
