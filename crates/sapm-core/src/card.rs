//! The card engine.
//!
//! [`CardEngine`] owns everything one audio card needs for power management:
//! the widget graph, the control table, the dirty set, the register devices
//! and the idle timer. All graph state sits behind a single card-wide mutex;
//! each public operation takes it for its whole duration (dirty marking,
//! recompute and register writes), and the idle timer thread takes the same
//! lock for every tick. Register access is additionally serialised by each
//! device's own lock.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::control::{ControlDescriptor, ControlInfo, ControlStore};
use crate::device::{Device, DeviceKind};
use crate::error::{Result, SapmError};
use crate::graph::{
    ClockGate, ComponentDescriptor, ComponentId, ComponentInfo, Graph, PathId, PathInfo,
};
use crate::idle::{IdleConfig, IdleOutcome, IdleScheduler, IdleState};
use crate::route::Route;
use crate::sequencer::{DirtySet, PowerReport};

/// Start or stop of a PCM stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOp {
    /// Stream started.
    Start,
    /// Stream stopped.
    Stop,
}

/// The card's register backends.
#[derive(Default)]
pub(crate) struct Devices {
    codec: Option<Arc<Device>>,
    accessory: Option<Arc<Device>>,
}

impl Devices {
    pub fn get(&self, kind: DeviceKind) -> Result<Arc<Device>> {
        let dev = match kind {
            DeviceKind::Codec => self.codec.as_ref(),
            DeviceKind::Accessory => self.accessory.as_ref(),
        };
        dev.cloned()
            .ok_or_else(|| SapmError::InvalidObject(format!("no {kind} device bound to card")))
    }

    pub fn has(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::Codec => self.codec.is_some(),
            DeviceKind::Accessory => self.accessory.is_some(),
        }
    }
}

/// Card state guarded by the card-wide lock.
pub(crate) struct CardState {
    pub name: String,
    pub graph: Graph,
    pub controls: ControlStore,
    pub dirty: DirtySet,
    pub devices: Devices,
    pub idle: IdleState,
    /// Bring-up (`new_controls`) has run.
    pub live: bool,
}

impl CardState {
    fn new(name: String, devices: Devices, idle: IdleConfig) -> Self {
        Self {
            name,
            graph: Graph::new(),
            controls: ControlStore::new(),
            dirty: DirtySet::default(),
            devices,
            idle: IdleState::new(idle, Instant::now()),
            live: false,
        }
    }

    fn info(&self, name: &str) -> Result<ComponentInfo> {
        let id = self.graph.resolve(name)?;
        Ok(self.graph.component(id).info())
    }
}

/// Power-management engine for one audio card.
///
/// Build it with [`CardEngine::new`], add components, routes and plain
/// controls, then call [`CardEngine::new_controls`] once to read the initial
/// hardware state, power the card and start the idle timer. Every method
/// takes `&self`, so the engine can be shared across threads in an `Arc`.
pub struct CardEngine {
    name: String,
    state: Arc<Mutex<CardState>>,
    scheduler: Mutex<Option<IdleScheduler>>,
}

impl CardEngine {
    /// Creates an empty card bound to the given backends.
    pub fn new(name: impl Into<String>, codec: Option<Device>, accessory: Option<Device>) -> Self {
        let name = name.into();
        let devices = Devices {
            codec: codec.map(Arc::new),
            accessory: accessory.map(Arc::new),
        };
        debug!(card = %name, codec = devices.has(DeviceKind::Codec), accessory = devices.has(DeviceKind::Accessory), "card created");
        Self {
            state: Arc::new(Mutex::new(CardState::new(name.clone(), devices, IdleConfig::default()))),
            name,
            scheduler: Mutex::new(None),
        }
    }

    /// Replaces the idle timer configuration. Takes effect the next time the
    /// timer is started.
    pub fn with_idle_config(self, config: IdleConfig) -> Self {
        self.state.lock().idle.config = config;
        self
    }

    /// Card name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current idle timer configuration.
    pub fn idle_config(&self) -> IdleConfig {
        self.state.lock().idle.config
    }

    /// Adds one component.
    pub fn new_component(&self, desc: &ComponentDescriptor) -> Result<ComponentId> {
        let mut ids = self.state.lock().new_components(core::slice::from_ref(desc))?;
        ids.pop().ok_or(SapmError::AllocFail)
    }

    /// Adds a batch of components; nothing is added if any entry is rejected.
    pub fn new_components(&self, descs: &[ComponentDescriptor]) -> Result<Vec<ComponentId>> {
        self.state.lock().new_components(descs)
    }

    /// Binds one route.
    pub fn add_route(&self, route: &Route) -> Result<PathId> {
        self.state.lock().add_route(route, Instant::now())
    }

    /// Binds routes in order, stopping at the first failure. Routes bound
    /// before the failure stay bound.
    pub fn add_routes(&self, routes: &[Route]) -> Result<usize> {
        self.state.lock().add_routes(routes, Instant::now())
    }

    /// Registers free-standing controls; nothing is registered if any entry
    /// is rejected.
    pub fn add_controls(&self, descs: &[ControlDescriptor]) -> Result<()> {
        self.state.lock().add_controls(descs)
    }

    /// Card bring-up: reads initial power and mux state, powers the card and
    /// starts the idle timer when enabled.
    pub fn new_controls(&self) -> Result<PowerReport> {
        let (report, idle) = {
            let mut state = self.state.lock();
            let report = state.new_controls(Instant::now())?;
            (report, state.idle.config)
        };
        info!(
            card = %self.name,
            powered_up = report.powered_up.len(),
            "card powered"
        );
        if idle.enabled {
            self.set_power_monitor(true)?;
        }
        Ok(report)
    }

    /// Runs the sequencer over the current dirty set.
    pub fn recompute_power(&self) -> Result<PowerReport> {
        self.state.lock().recompute_power()
    }

    /// Queues a component for the next recompute.
    pub fn mark_dirty(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let id = state.graph.resolve(name)?;
        state.dirty.insert(id);
        Ok(())
    }

    /// Describes a control.
    pub fn control_info(&self, name: &str) -> Result<ControlInfo> {
        self.state.lock().control_info(name)
    }

    /// Reads a control (one value per channel).
    pub fn control_get(&self, name: &str) -> Result<Vec<u32>> {
        self.state.lock().control_get(name)
    }

    /// Sets a control, re-sequencing power if it gates any path.
    pub fn control_set(&self, name: &str, values: &[u32]) -> Result<PowerReport> {
        self.state.lock().control_set(name, values, Instant::now())
    }

    /// Marks the endpoints of `stream` active or inactive and re-sequences.
    pub fn stream_event(&self, stream: &str, op: StreamOp) -> Result<PowerReport> {
        let mut state = self.state.lock();
        let active = op == StreamOp::Start;
        let ids: Vec<ComponentId> = state
            .graph
            .components()
            .filter(|c| c.kind.is_stream_endpoint() && c.stream.as_deref() == Some(stream))
            .map(|c| c.id)
            .collect();
        if ids.is_empty() {
            return Err(SapmError::NotFound(format!("stream '{stream}'")));
        }
        for id in ids {
            state.graph.component_mut(id).active = active;
            state.dirty.insert(id);
        }
        state.idle.refresh(Instant::now());
        debug!(card = %self.name, stream, ?op, "stream event");
        state.recompute_power()
    }

    /// Runs one idle check at `now`. The idle timer calls this itself; it is
    /// public so the state machine can be driven deterministically.
    pub fn idle_tick(&self, now: Instant) -> IdleOutcome {
        self.state.lock().idle_tick(now)
    }

    /// Leaves the sleeping state and re-powers everything that should be on.
    pub fn resume(&self) -> Result<PowerReport> {
        let mut state = self.state.lock();
        state.idle.refresh(Instant::now());
        state.mark_all_dirty();
        info!(card = %self.name, "card resumed");
        state.recompute_power()
    }

    /// Starts or stops the idle timer thread.
    pub fn set_power_monitor(&self, enabled: bool) -> Result<()> {
        let mut scheduler = self.scheduler.lock();
        match (enabled, scheduler.is_some()) {
            (true, false) => {
                let poll = self.state.lock().idle.config.poll_interval;
                *scheduler = Some(IdleScheduler::spawn(&self.name, Arc::clone(&self.state), poll)?);
            }
            (false, true) => {
                // Joins the thread.
                scheduler.take();
                debug!(card = %self.name, "idle timer stopped");
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether the idle timer thread is running.
    pub fn is_power_monitor_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    /// Attaches a clock-gating hook to a component.
    pub fn set_clock_hook<F>(&self, component: &str, hook: F) -> Result<()>
    where
        F: FnMut(ClockGate) -> core::result::Result<(), crate::error::BusError> + Send + 'static,
    {
        let mut state = self.state.lock();
        let id = state.graph.resolve(component)?;
        state.graph.component_mut(id).clock_hook = Some(Box::new(hook));
        Ok(())
    }

    /// Snapshot of one component.
    pub fn component(&self, name: &str) -> Result<ComponentInfo> {
        self.state.lock().info(name)
    }

    /// Snapshot of every component, in creation order.
    pub fn components(&self) -> Vec<ComponentInfo> {
        self.state.lock().graph.component_infos()
    }

    /// Snapshot of every path, in binding order.
    pub fn paths(&self) -> Vec<PathInfo> {
        let state = self.state.lock();
        state.graph.path_ids().map(|id| state.graph.path_info(id)).collect()
    }

    /// Names of every registered control.
    pub fn controls(&self) -> Vec<String> {
        self.state.lock().controls.names()
    }

    /// Input terminals reaching `name` through connected paths.
    pub fn connected_input_count(&self, name: &str) -> Result<usize> {
        let state = self.state.lock();
        let id = state.graph.resolve(name)?;
        Ok(state.graph.connected_input_count(id))
    }

    /// Output terminals reached from `name` through connected paths.
    pub fn connected_output_count(&self, name: &str) -> Result<usize> {
        let state = self.state.lock();
        let id = state.graph.resolve(name)?;
        Ok(state.graph.connected_output_count(id))
    }

    /// Whether the idle sweep has collapsed the card.
    pub fn is_sleeping(&self) -> bool {
        self.state.lock().idle.sleeping
    }

    /// Whether clock hooks are currently gated.
    pub fn is_standby(&self) -> bool {
        self.state.lock().idle.standby
    }

    /// Whether a component is waiting for the next recompute.
    pub fn is_dirty(&self, name: &str) -> Result<bool> {
        let state = self.state.lock();
        let id = state.graph.resolve(name)?;
        Ok(state.dirty.contains(id))
    }

    /// Components waiting for the next recompute.
    pub fn dirty_count(&self) -> usize {
        self.state.lock().dirty.len()
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.state.lock().graph.component_count()
    }

    /// Number of paths.
    pub fn path_count(&self) -> usize {
        self.state.lock().graph.path_count()
    }

    /// Stops the idle timer. Called on drop; after it returns no tick can
    /// touch the card.
    pub fn shutdown(&self) {
        self.scheduler.lock().take();
    }
}

impl Drop for CardEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for CardEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CardEngine")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
