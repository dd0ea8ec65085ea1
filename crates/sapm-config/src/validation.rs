//! Card table validation.
//!
//! Catches table mistakes before any register is touched: unknown kinds,
//! name clashes, routes naming components or controls that do not exist,
//! and control fields that can never hold a legal value.
//!
//! # Example
//!
//! ```rust
//! use sapm_config::{CardConfig, ComponentConfig, validate_card};
//!
//! let card = CardConfig::new("broken")
//!     .with_component(ComponentConfig::new("dac", "DACL"))
//!     .with_route("SPKL", None, "DACL");
//! assert!(validate_card(&card).is_err());
//! ```

use std::collections::HashMap;

use sapm_core::{ComponentKind, ControlFamily, DeviceKind};
use thiserror::Error;

use crate::card::{CardConfig, ComponentConfig, ControlConfig, ControlConfigKind};

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown component kind.
    #[error("unknown component kind: {0}")]
    UnknownKind(String),

    /// Unknown backend name.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Two components share a name.
    #[error("duplicate component name: {0}")]
    DuplicateComponent(String),

    /// Two different controls share a name.
    #[error("duplicate control name: {0}")]
    DuplicateControl(String),

    /// A route names a component the table does not declare.
    #[error("route {sink} <- {source_name}: unknown component '{name}'")]
    UnknownEndpoint {
        /// Route sink.
        sink: String,
        /// Route source.
        source_name: String,
        /// The missing component.
        name: String,
    },

    /// A route connects a component to itself.
    #[error("route {0} <- {0} loops onto itself")]
    SelfRoute(String),

    /// A mixer-style route names a control its sink does not own.
    #[error("route into '{sink}' names control '{control}' which '{sink}' does not own")]
    UnownedControl {
        /// Route sink.
        sink: String,
        /// The control named by the route.
        control: String,
    },

    /// A mux route names an item missing from the selector's texts.
    #[error("mux '{sink}' has no item '{item}'")]
    UnknownMuxItem {
        /// The mux.
        sink: String,
        /// The item named by the route.
        item: String,
    },

    /// A mux must own exactly one enumerated control.
    #[error("mux '{0}' must own exactly one enum control")]
    MuxControl(String),

    /// Control range is empty.
    #[error("control '{control}': min {min} exceeds max {max}")]
    InvalidRange {
        /// Control name.
        control: String,
        /// Lowest value.
        min: u32,
        /// Highest value.
        max: u32,
    },

    /// Control field has no bits.
    #[error("control '{0}': mask is zero")]
    ZeroMask(String),

    /// Control range does not fit its field.
    #[error("control '{control}': max {max} does not fit mask {mask:#x}")]
    MaxExceedsMask {
        /// Control name.
        control: String,
        /// Highest value.
        max: u32,
        /// Field mask.
        mask: u32,
    },

    /// Enumerated control has no items, or mismatched item values.
    #[error("enum control '{control}': {reason}")]
    InvalidEnum {
        /// Control name.
        control: String,
        /// Description of the problem.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a whole card table, collecting every problem found.
pub fn validate_card(card: &CardConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    let mut components: HashMap<&str, &ComponentConfig> = HashMap::new();
    for comp in &card.components {
        if comp.kind.parse::<ComponentKind>().is_err() {
            errors.push(ValidationError::UnknownKind(comp.kind.clone()));
        }
        if let Err(e) = validate_device(&comp.device) {
            errors.push(e);
        }
        if components.insert(comp.name.as_str(), comp).is_some() {
            errors.push(ValidationError::DuplicateComponent(comp.name.clone()));
        }
        if let Ok(kind) = comp.kind.parse::<ComponentKind>()
            && kind.control_family() == ControlFamily::Mux
        {
            let enums = comp
                .controls
                .iter()
                .filter(|c| c.kind == ControlConfigKind::Enum)
                .count();
            if enums != 1 || comp.controls.len() != 1 {
                errors.push(ValidationError::MuxControl(comp.name.clone()));
            }
        }
    }

    let mut seen: HashMap<&str, &ControlConfig> = HashMap::new();
    let all_controls = card
        .components
        .iter()
        .flat_map(|c| c.controls.iter())
        .chain(card.controls.iter());
    for control in all_controls {
        // Components may share one switch; the copies must agree.
        match seen.insert(control.name.as_str(), control) {
            Some(prev) if prev != control => {
                errors.push(ValidationError::DuplicateControl(control.name.clone()));
            }
            _ => {}
        }
        if let Err(e) = validate_control(control) {
            errors.push(e);
        }
    }

    for route in &card.routes {
        if route.sink == route.source {
            errors.push(ValidationError::SelfRoute(route.sink.clone()));
            continue;
        }
        let mut missing = false;
        for name in [&route.source, &route.sink] {
            if !components.contains_key(name.as_str()) {
                errors.push(ValidationError::UnknownEndpoint {
                    sink: route.sink.clone(),
                    source_name: route.source.clone(),
                    name: name.clone(),
                });
                missing = true;
            }
        }
        if missing {
            continue;
        }
        if let (Some(control), Some(sink)) = (&route.control, components.get(route.sink.as_str()))
            && let Err(e) = validate_route_control(sink, control)
        {
            errors.push(e);
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Validate one control's field geometry.
pub fn validate_control(control: &ControlConfig) -> ValidationResult<()> {
    validate_device(&control.device)?;
    if control.mask == 0 {
        return Err(ValidationError::ZeroMask(control.name.clone()));
    }
    match control.kind {
        ControlConfigKind::Mixer => {
            if control.min > control.max {
                return Err(ValidationError::InvalidRange {
                    control: control.name.clone(),
                    min: control.min,
                    max: control.max,
                });
            }
            if control.max > control.mask {
                return Err(ValidationError::MaxExceedsMask {
                    control: control.name.clone(),
                    max: control.max,
                    mask: control.mask,
                });
            }
        }
        ControlConfigKind::Enum => {
            if control.texts.is_empty() {
                return Err(ValidationError::InvalidEnum {
                    control: control.name.clone(),
                    reason: "no items".to_string(),
                });
            }
            if let Some(values) = &control.values
                && values.len() != control.texts.len()
            {
                return Err(ValidationError::InvalidEnum {
                    control: control.name.clone(),
                    reason: format!("{} items but {} values", control.texts.len(), values.len()),
                });
            }
        }
    }
    Ok(())
}

fn validate_device(device: &str) -> ValidationResult<()> {
    device
        .parse::<DeviceKind>()
        .map(|_| ())
        .map_err(|_| ValidationError::UnknownDevice(device.to_string()))
}

fn validate_route_control(sink: &ComponentConfig, control: &str) -> ValidationResult<()> {
    let Ok(kind) = sink.kind.parse::<ComponentKind>() else {
        // Already reported as an unknown kind.
        return Ok(());
    };
    match kind.control_family() {
        ControlFamily::Mixer => {
            if sink.controls.iter().any(|c| c.name == control) {
                Ok(())
            } else {
                Err(ValidationError::UnownedControl {
                    sink: sink.name.clone(),
                    control: control.to_string(),
                })
            }
        }
        ControlFamily::Mux => {
            let known = sink
                .controls
                .iter()
                .filter(|c| c.kind == ControlConfigKind::Enum)
                .any(|c| c.texts.iter().any(|t| t == control));
            if known {
                Ok(())
            } else {
                Err(ValidationError::UnknownMuxItem {
                    sink: sink.name.clone(),
                    item: control.to_string(),
                })
            }
        }
        // Bound as a direct wire.
        ControlFamily::Plain => Ok(()),
    }
}
