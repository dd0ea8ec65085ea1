//! Path (edge) types.
//!
//! A path carries signal from its source component to its sink component.
//! Direct wires are always connected; control-gated paths take their
//! `connect` state from the mixer switch or mux selection that owns them.

use super::component::ComponentId;

/// Unique identifier for a path on one card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PathId(pub(crate) u32);

impl PathId {
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

/// A directed connection between two components.
pub(crate) struct Path {
    pub source: ComponentId,
    pub sink: ComponentId,
    /// Control name (mixer) or mux item text; `None` for direct wires.
    pub name: Option<String>,
    pub connect: bool,
    /// Card control index gating this path.
    pub control: Option<usize>,
}

impl Path {
    pub fn direct(source: ComponentId, sink: ComponentId) -> Self {
        Self {
            source,
            sink,
            name: None,
            connect: true,
            control: None,
        }
    }

    pub fn gated(source: ComponentId, sink: ComponentId, name: &str, control: usize) -> Self {
        Self {
            source,
            sink,
            name: Some(name.to_string()),
            connect: false,
            control: Some(control),
        }
    }
}

/// Snapshot of a path for introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathInfo {
    /// Path id.
    pub id: PathId,
    /// Source component name.
    pub source: String,
    /// Sink component name.
    pub sink: String,
    /// Gating control name or mux item, `None` for direct wires.
    pub name: Option<String>,
    /// Whether the path currently carries signal.
    pub connect: bool,
}
