//! Widget graph: component and path arena plus connectivity evaluation.
//!
//! The graph owns every [`ComponentDescriptor`]-built component of one card
//! and the paths between them. Adjacency is stored as path ids on both
//! endpoints, so walks in either direction never need to scan the whole path
//! list.

mod component;
mod connectivity;
mod path;
mod store;

pub use component::{
    ClockGate, ClockHook, ComponentDescriptor, ComponentId, ComponentInfo, PowerState,
    RegisterCtrl,
};
pub use path::{PathId, PathInfo};

pub(crate) use path::Path;
pub(crate) use store::Graph;
