//! Error types for the SAPM engine.

use thiserror::Error;

/// Failure reported by a register backend.
///
/// Backends (codec or accessory drivers) construct this from whatever their
/// bus layer returns; the engine only carries it through to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bus transaction failed: {0}")]
pub struct BusError(String);

impl BusError {
    /// Creates a bus error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Returns the reason string.
    pub fn reason(&self) -> &str {
        &self.0
    }
}

/// Errors returned by card, graph and control operations.
#[derive(Debug, Error)]
pub enum SapmError {
    /// A required object (device, component, control) is absent.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A component or control name could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value or descriptor field is outside its declared range.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Storage for new components or paths could not be reserved.
    #[error("allocation failed")]
    AllocFail,

    /// A register read or write failed.
    #[error("register I/O failed on {device} reg {reg:#x}: {source}")]
    Io {
        /// Name of the device that owns the register.
        device: String,
        /// Register address.
        reg: u32,
        /// Backend failure.
        #[source]
        source: BusError,
    },

    /// Binding this route would close a loop in the widget graph.
    #[error("route {source_name} -> {sink} would create a cycle")]
    CycleDetected {
        /// Route source component.
        source_name: String,
        /// Route sink component.
        sink: String,
    },

    /// A component or control name is already used on this card.
    #[error("duplicate name: {0}")]
    Duplicate(String),
}

impl SapmError {
    /// Creates a not-found error for a component name.
    pub fn component_not_found(name: &str) -> Self {
        SapmError::NotFound(format!("component '{name}'"))
    }

    /// Creates a not-found error for a control name.
    pub fn control_not_found(name: &str) -> Self {
        SapmError::NotFound(format!("control '{name}'"))
    }

    /// Returns `true` for register I/O failures.
    pub fn is_io(&self) -> bool {
        matches!(self, SapmError::Io { .. })
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = core::result::Result<T, SapmError>;
