//! Connectivity evaluation.
//!
//! A component is live when it sits on a complete signal chain: some input
//! terminal reaches it through connected paths, and it reaches some output
//! terminal the same way. Counts are the number of distinct terminal
//! components reachable; each walk keeps a visited set so a looped table
//! terminates.

use crate::kind::{ComponentKind, PowerCheck};

use super::component::{Component, ComponentId, PowerState};
use super::path::Path;
use super::store::Graph;

#[derive(Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

impl Direction {
    fn is_terminal(self, kind: ComponentKind) -> bool {
        match self {
            Direction::Upstream => kind.is_input_terminal(),
            Direction::Downstream => kind.is_output_terminal(),
        }
    }

    fn edges(self, comp: &Component) -> &[super::path::PathId] {
        match self {
            Direction::Upstream => &comp.sources,
            Direction::Downstream => &comp.sinks,
        }
    }

    fn next(self, path: &Path) -> ComponentId {
        match self {
            Direction::Upstream => path.source,
            Direction::Downstream => path.sink,
        }
    }
}

impl Graph {
    /// Number of input terminals feeding `id` through connected paths.
    pub fn connected_input_count(&self, id: ComponentId) -> usize {
        self.count_terminals(id, Direction::Upstream)
    }

    /// Number of output terminals fed by `id` through connected paths.
    pub fn connected_output_count(&self, id: ComponentId) -> usize {
        self.count_terminals(id, Direction::Downstream)
    }

    /// Evaluates the component's bound power-check policy.
    pub fn check_power(&self, id: ComponentId) -> PowerState {
        let comp = self.component(id);
        let generic = || {
            PowerState::from_on(
                self.connected_input_count(id) > 0 && self.connected_output_count(id) > 0,
            )
        };
        match comp.check {
            PowerCheck::Generic => generic(),
            PowerCheck::Adc if comp.active => {
                PowerState::from_on(self.connected_input_count(id) > 0)
            }
            PowerCheck::Dac if comp.active => {
                PowerState::from_on(self.connected_output_count(id) > 0)
            }
            PowerCheck::Adc | PowerCheck::Dac => generic(),
        }
    }

    fn count_terminals(&self, start: ComponentId, dir: Direction) -> usize {
        let mut visited = vec![false; self.component_count()];
        let mut stack = vec![start];
        let mut count = 0;

        while let Some(current) = stack.pop() {
            let idx = current.slot();
            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            let comp = self.component(current);
            if dir.is_terminal(comp.kind) {
                count += 1;
                continue;
            }
            for path_id in dir.edges(comp) {
                let path = self.path(*path_id);
                if path.connect {
                    stack.push(dir.next(path));
                }
            }
        }
        count
    }
}
