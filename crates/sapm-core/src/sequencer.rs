//! Power sequencer.
//!
//! `recompute_power` drains the dirty set: every dirty component has its
//! power-check policy evaluated, components whose state flips are bucketed
//! for power-down or power-up, and the flip is propagated one hop to
//! connected neighbours that disagree with it. Neighbours queued this way are
//! consumed in the same pass; a component is evaluated at most once per pass.
//!
//! Buckets are then executed power-down first, each in ascending phase order
//! of its own table, so old routes are torn down before new ones come up.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::card::CardState;
use crate::error::Result;
use crate::graph::{ClockGate, ComponentId, PowerState};

/// Outcome of one sequencer pass, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PowerReport {
    /// Components powered down, in power-down phase order.
    pub powered_down: Vec<String>,
    /// Components powered up, in power-up phase order.
    pub powered_up: Vec<String>,
}

impl PowerReport {
    /// Returns `true` if nothing changed state.
    pub fn is_empty(&self) -> bool {
        self.powered_down.is_empty() && self.powered_up.is_empty()
    }

    /// Appends another pass's transitions.
    pub fn merge(&mut self, other: PowerReport) {
        self.powered_down.extend(other.powered_down);
        self.powered_up.extend(other.powered_up);
    }
}

/// Pending-recompute set: FIFO order with set membership.
#[derive(Default)]
pub(crate) struct DirtySet {
    queue: VecDeque<ComponentId>,
    member: Vec<bool>,
}

impl DirtySet {
    /// Queues `id` unless it is already queued. Returns whether it was added.
    pub fn insert(&mut self, id: ComponentId) -> bool {
        let slot = id.slot();
        if slot >= self.member.len() {
            self.member.resize(slot + 1, false);
        }
        if self.member[slot] {
            return false;
        }
        self.member[slot] = true;
        self.queue.push_back(id);
        true
    }

    pub fn pop(&mut self) -> Option<ComponentId> {
        let id = self.queue.pop_front()?;
        self.member[id.slot()] = false;
        Some(id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.member.get(id.slot()).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl CardState {
    /// Marks every component dirty.
    pub(crate) fn mark_all_dirty(&mut self) {
        let ids: Vec<ComponentId> = self.graph.components().map(|c| c.id).collect();
        for id in ids {
            self.dirty.insert(id);
        }
    }

    /// Drains the dirty set and applies the resulting power transitions.
    pub(crate) fn recompute_power(&mut self) -> Result<PowerReport> {
        let mut visited = vec![false; self.graph.component_count()];
        let mut up = Vec::new();
        let mut down = Vec::new();
        let mut ungated = false;

        while let Some(id) = self.dirty.pop() {
            if visited[id.slot()] {
                continue;
            }
            visited[id.slot()] = true;

            let desired = self.graph.check_power(id);
            let comp = self.graph.component_mut(id);
            comp.requested_power = desired;
            if desired == comp.power {
                continue;
            }

            if self.idle.standby
                && let Some(hook) = comp.clock_hook.as_mut()
            {
                if let Err(err) = hook(ClockGate::Ungate) {
                    warn!(component = %comp.name, error = %err, "clock ungate failed");
                }
                ungated = true;
            }

            for neighbour in self.graph.connected_neighbours(id) {
                if !visited[neighbour.slot()] && self.graph.component(neighbour).power != desired {
                    self.dirty.insert(neighbour);
                }
            }

            let comp = self.graph.component_mut(id);
            debug!(component = %comp.name, from = %comp.power, to = %desired, "power transition queued");
            comp.power = desired;
            if desired.is_up() {
                up.push(id);
            } else {
                down.push(id);
            }
        }

        if ungated {
            self.idle.standby = false;
        }

        down.sort_by_key(|id| self.graph.component(*id).kind.power_down_phase());
        up.sort_by_key(|id| self.graph.component(*id).kind.power_up_phase());

        for (i, id) in down.iter().enumerate() {
            if let Err(err) = self.apply_power(*id) {
                self.roll_back(&down[i..], &up);
                return Err(err);
            }
        }
        for (i, id) in up.iter().enumerate() {
            if let Err(err) = self.apply_power(*id) {
                self.roll_back(&[], &up[i..]);
                return Err(err);
            }
        }

        Ok(PowerReport {
            powered_down: self.names(&down),
            powered_up: self.names(&up),
        })
    }

    /// Writes a component's current `power` to its register field.
    pub(crate) fn apply_power(&self, id: ComponentId) -> Result<()> {
        let comp = self.graph.component(id);
        let Some(reg) = comp.register else {
            return Ok(());
        };
        let device = self.devices.get(comp.device)?;
        device.update_bits(reg.reg, reg.mask, reg.shift, reg.field_for(comp.power), false)?;
        debug!(component = %comp.name, reg = reg.reg, power = %comp.power, "power applied");
        Ok(())
    }

    fn roll_back(&mut self, down: &[ComponentId], up: &[ComponentId]) {
        for id in down {
            self.graph.component_mut(*id).power = PowerState::Up;
            self.dirty.insert(*id);
        }
        for id in up {
            self.graph.component_mut(*id).power = PowerState::Down;
            self.dirty.insert(*id);
        }
        warn!(
            card = %self.name,
            pending = down.len() + up.len(),
            "register failure, unexecuted transitions rolled back"
        );
    }

    pub(crate) fn names(&self, ids: &[ComponentId]) -> Vec<String> {
        ids.iter()
            .map(|id| self.graph.component(*id).name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_set_is_a_set() {
        let mut dirty = DirtySet::default();
        assert!(dirty.insert(ComponentId(3)));
        assert!(!dirty.insert(ComponentId(3)));
        assert!(dirty.insert(ComponentId(0)));
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains(ComponentId(3)));

        assert_eq!(dirty.pop(), Some(ComponentId(3)));
        assert!(!dirty.contains(ComponentId(3)));
        assert!(dirty.insert(ComponentId(3)));
        assert_eq!(dirty.pop(), Some(ComponentId(0)));
        assert_eq!(dirty.pop(), Some(ComponentId(3)));
        assert_eq!(dirty.pop(), None);
    }

    #[test]
    fn report_merge() {
        let mut a = PowerReport {
            powered_down: vec!["A".into()],
            powered_up: vec![],
        };
        a.merge(PowerReport {
            powered_down: vec![],
            powered_up: vec!["B".into()],
        });
        assert!(!a.is_empty());
        assert_eq!(a.powered_up, vec!["B".to_string()]);
    }
}
