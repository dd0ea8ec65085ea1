//! In-memory register map.
//!
//! [`MemoryRegisters`] implements [`RegisterIo`] over a sparse map of 32-bit
//! registers and records every write, so tests and the simulator can inspect
//! exactly what the engine would have put on the bus. Clones share state, so
//! one handle can be given to a [`Device`](crate::Device) while another is
//! kept for inspection. Reads of unwritten registers return zero.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::RegisterIo;
use crate::error::BusError;

/// One recorded bus write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Register address.
    pub reg: u32,
    /// Value written.
    pub value: u32,
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<u32, u32>,
    writes: Vec<RegisterWrite>,
    reads: usize,
    failing: HashSet<u32>,
    /// Remaining writes before every further write fails.
    write_budget: Option<usize>,
}

/// Shared, inspectable register map.
#[derive(Clone, Default)]
pub struct MemoryRegisters {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRegisters {
    /// Creates an empty register map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map with initial register values.
    pub fn with_values(values: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let regs = Self::new();
        regs.state.lock().values.extend(values);
        regs
    }

    /// Sets a register without recording a write.
    pub fn preload(&self, reg: u32, value: u32) {
        self.state.lock().values.insert(reg, value);
    }

    /// Current value of a register.
    pub fn value(&self, reg: u32) -> u32 {
        self.state.lock().values.get(&reg).copied().unwrap_or(0)
    }

    /// Every write issued so far, oldest first.
    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.state.lock().writes.clone()
    }

    /// Number of reads issued so far.
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Forgets recorded writes and reads.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.reads = 0;
    }

    /// Makes every access to `reg` fail.
    pub fn fail_register(&self, reg: u32) {
        self.state.lock().failing.insert(reg);
    }

    /// Lets `count` more writes succeed, then fails every write.
    pub fn fail_writes_after(&self, count: usize) {
        self.state.lock().write_budget = Some(count);
    }

    /// Clears all injected faults.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.failing.clear();
        state.write_budget = None;
    }

    /// Snapshot of all registers, sorted by address.
    pub fn snapshot(&self) -> Vec<(u32, u32)> {
        let mut regs: Vec<_> = self.state.lock().values.iter().map(|(r, v)| (*r, *v)).collect();
        regs.sort_unstable();
        regs
    }
}

impl RegisterIo for MemoryRegisters {
    fn read_reg(&mut self, reg: u32) -> Result<u32, BusError> {
        let mut state = self.state.lock();
        if state.failing.contains(&reg) {
            return Err(BusError::new(format!("read of {reg:#x} rejected")));
        }
        state.reads += 1;
        Ok(state.values.get(&reg).copied().unwrap_or(0))
    }

    fn write_reg(&mut self, reg: u32, value: u32) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if state.failing.contains(&reg) {
            return Err(BusError::new(format!("write of {reg:#x} rejected")));
        }
        if let Some(budget) = state.write_budget.as_mut() {
            if *budget == 0 {
                return Err(BusError::new(format!("write of {reg:#x} rejected")));
            }
            *budget -= 1;
        }
        state.values.insert(reg, value);
        state.writes.push(RegisterWrite { reg, value });
        Ok(())
    }
}
