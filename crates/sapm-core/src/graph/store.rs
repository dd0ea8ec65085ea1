//! Arena that owns every component and path of one card.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, SapmError};

use super::component::{Component, ComponentDescriptor, ComponentId, ComponentInfo};
use super::path::{Path, PathId, PathInfo};

/// Component and path storage for one card.
///
/// Components and paths are stored in insertion order and addressed by
/// index-backed ids. Nothing is ever removed: the whole arena is dropped with
/// the card, so ids stay valid for the card's lifetime.
#[derive(Default)]
pub(crate) struct Graph {
    components: Vec<Component>,
    paths: Vec<Path>,
    by_name: HashMap<String, ComponentId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves room for `components` more components, reporting allocation
    /// failure instead of aborting.
    pub fn reserve_components(&mut self, components: usize) -> Result<()> {
        self.components
            .try_reserve(components)
            .map_err(|_| SapmError::AllocFail)?;
        self.by_name
            .try_reserve(components)
            .map_err(|_| SapmError::AllocFail)
    }

    pub fn reserve_paths(&mut self, paths: usize) -> Result<()> {
        self.paths.try_reserve(paths).map_err(|_| SapmError::AllocFail)
    }

    /// Appends a component. The caller has already checked the name is free.
    pub fn insert_component(&mut self, desc: &ComponentDescriptor) -> ComponentId {
        let id = ComponentId(self.components.len() as u32);
        self.components.push(Component::from_descriptor(id, desc));
        self.by_name.insert(desc.name.clone(), id);
        debug!(component = %desc.name, kind = %desc.kind, id = id.index(), "component added");
        id
    }

    /// Links a path into the arena and both endpoints' adjacency lists.
    pub fn link(&mut self, path: Path) -> PathId {
        let id = PathId(self.paths.len() as u32);
        let (source, sink) = (path.source, path.sink);
        self.paths.push(path);
        self.components[source.slot()].sinks.push(id);
        self.components[sink.slot()].sources.push(id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<ComponentId> {
        self.lookup(name)
            .ok_or_else(|| SapmError::component_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.slot()]
    }

    pub fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id.slot()]
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.iter_mut()
    }

    pub fn path(&self, id: PathId) -> &Path {
        &self.paths[id.slot()]
    }

    pub fn path_mut(&mut self, id: PathId) -> &mut Path {
        &mut self.paths[id.slot()]
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> + use<> {
        (0..self.paths.len() as u32).map(PathId)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn path_info(&self, id: PathId) -> PathInfo {
        let path = self.path(id);
        PathInfo {
            id,
            source: self.component(path.source).name.clone(),
            sink: self.component(path.sink).name.clone(),
            name: path.name.clone(),
            connect: path.connect,
        }
    }

    pub fn component_infos(&self) -> Vec<ComponentInfo> {
        self.components.iter().map(Component::info).collect()
    }

    /// Checks whether `to` is reachable from `from` following path direction,
    /// regardless of each path's current `connect` state.
    pub fn can_reach(&self, from: ComponentId, to: ComponentId) -> bool {
        let mut visited = vec![false; self.components.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.slot();
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            for path_id in &self.components[idx].sinks {
                stack.push(self.paths[path_id.slot()].sink);
            }
        }
        false
    }

    /// Neighbours across connected paths in both directions.
    pub fn connected_neighbours(&self, id: ComponentId) -> Vec<ComponentId> {
        let comp = self.component(id);
        let upstream = comp
            .sources
            .iter()
            .map(|p| self.path(*p))
            .filter(|p| p.connect)
            .map(|p| p.source);
        let downstream = comp
            .sinks
            .iter()
            .map(|p| self.path(*p))
            .filter(|p| p.connect)
            .map(|p| p.sink);
        upstream.chain(downstream).collect()
    }
}
