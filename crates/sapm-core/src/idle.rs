//! Idle power collapse.
//!
//! The card records the time of its last activity (control set, route
//! change, stream event, resume). A poll thread calls
//! [`CardState::idle_tick`] every `poll_interval`. An idle cycle takes two
//! consecutive expiries of `sleep_threshold`:
//!
//! 1. the first re-arms the timer; if any component has a clock hook, every
//!    hook is called with [`ClockGate::Gate`] and the card enters standby;
//! 2. the second forces every powered component down in power-down phase
//!    order and marks the card sleeping.
//!
//! Any activity disarms the cycle and clears `sleeping`. Control sets made
//! while sleeping always rewrite their register to resynchronise hardware.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::card::CardState;
use crate::error::{Result, SapmError};
use crate::graph::{ClockGate, ComponentId, PowerState};
use crate::sequencer::PowerReport;

/// Default poll period of the idle timer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default inactivity before the card collapses.
pub const DEFAULT_SLEEP_THRESHOLD: Duration = Duration::from_secs(180);

/// Idle timer configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleConfig {
    /// How often the timer checks for inactivity.
    pub poll_interval: Duration,
    /// Inactivity after which a tick counts as an expiry.
    pub sleep_threshold: Duration,
    /// Start the timer at bring-up.
    pub enabled: bool,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sleep_threshold: DEFAULT_SLEEP_THRESHOLD,
            enabled: true,
        }
    }
}

/// What an idle tick did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdleOutcome {
    /// Recent activity; nothing to do.
    Busy,
    /// Already sleeping.
    Asleep,
    /// First expiry of a cycle with no clock hook to gate; the timer re-armed.
    Armed,
    /// First expiry of a cycle; clock hooks were gated.
    Standby,
    /// Every powered component was forced down.
    Slept(PowerReport),
}

pub(crate) struct IdleState {
    pub config: IdleConfig,
    pub last_activity: Instant,
    pub sleeping: bool,
    pub standby: bool,
    /// The first expiry of the current cycle has passed.
    pub armed: bool,
}

impl IdleState {
    pub fn new(config: IdleConfig, now: Instant) -> Self {
        Self {
            config,
            last_activity: now,
            sleeping: false,
            standby: false,
            armed: false,
        }
    }

    /// Records activity, leaves the sleeping state and disarms the cycle.
    pub fn refresh(&mut self, now: Instant) {
        self.last_activity = now;
        self.sleeping = false;
        self.armed = false;
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > self.config.sleep_threshold
    }
}

impl CardState {
    /// Advances the idle state machine.
    pub(crate) fn idle_tick(&mut self, now: Instant) -> IdleOutcome {
        if self.idle.sleeping {
            return IdleOutcome::Asleep;
        }
        if !self.idle.expired(now) {
            return IdleOutcome::Busy;
        }
        if !self.idle.armed {
            self.idle.armed = true;
            self.idle.last_activity = now;
            let has_hooks = self.graph.components().any(|c| c.clock_hook.is_some());
            if !has_hooks || self.idle.standby {
                debug!(card = %self.name, "idle timer re-armed");
                return IdleOutcome::Armed;
            }
            for comp in self.graph.components_mut() {
                if let Some(hook) = comp.clock_hook.as_mut()
                    && let Err(err) = hook(ClockGate::Gate)
                {
                    warn!(component = %comp.name, error = %err, "clock gate failed");
                }
            }
            self.idle.standby = true;
            info!(card = %self.name, "entering standby");
            return IdleOutcome::Standby;
        }

        self.idle.standby = false;
        self.idle.armed = false;
        let report = self.sweep();
        self.idle.sleeping = true;
        info!(card = %self.name, powered_down = report.powered_down.len(), "card sleeping");
        IdleOutcome::Slept(report)
    }

    /// Forces every powered component down, bypassing the dirty set.
    ///
    /// A component whose register write fails keeps its state; the sweep
    /// carries on with the rest.
    fn sweep(&mut self) -> PowerReport {
        let mut targets: Vec<ComponentId> = self
            .graph
            .components()
            .filter(|c| c.power.is_up())
            .map(|c| c.id)
            .collect();
        targets.sort_by_key(|id| self.graph.component(*id).kind.power_down_phase());

        let mut done = Vec::with_capacity(targets.len());
        for id in targets {
            self.graph.component_mut(id).power = PowerState::Down;
            match self.apply_power(id) {
                Ok(()) => done.push(id),
                Err(err) => {
                    let comp = self.graph.component_mut(id);
                    comp.power = PowerState::Up;
                    warn!(component = %comp.name, error = %err, "idle sweep write failed");
                }
            }
        }
        PowerReport {
            powered_down: self.names(&done),
            powered_up: Vec::new(),
        }
    }
}

/// Background thread driving [`CardState::idle_tick`].
///
/// Dropping the scheduler stops and joins the thread, so no tick can run
/// after the owner has released the card.
pub(crate) struct IdleScheduler {
    stop: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl IdleScheduler {
    pub fn spawn(card: &str, state: Arc<Mutex<CardState>>, poll: Duration) -> Result<Self> {
        let (stop, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(format!("sapm-idle-{card}"))
            .spawn(move || {
                loop {
                    match rx.recv_timeout(poll) {
                        Err(RecvTimeoutError::Timeout) => {
                            let outcome = state.lock().idle_tick(Instant::now());
                            if outcome != IdleOutcome::Busy {
                                debug!(?outcome, "idle tick");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| SapmError::InvalidObject(format!("idle timer thread: {err}")))?;
        debug!(card, ?poll, "idle timer started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for IdleScheduler {
    fn drop(&mut self) {
        // Send fails only if the thread already exited.
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("idle timer thread panicked");
        }
    }
}
