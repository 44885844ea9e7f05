use std::time::Instant;

use dashmap::DashMap;

use graphscribe_core::JobKind;

#[derive(Debug, Clone, Copy)]
struct GateState {
    limited: bool,
    eligible_at: Instant,
}

/// Per-resource quiet windows. One entry per resource key (the job kind),
/// created on the first rate-limit observation. A closed gate clears
/// implicitly once its deadline lapses; no job of that kind may start
/// while the gate is closed.
#[derive(Debug, Default)]
pub struct GateTable {
    gates: DashMap<JobKind, GateState>,
}

impl GateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate until `until`. A later deadline extends an already
    /// closed gate; an earlier one never shortens it.
    pub fn mark_limited(&self, kind: JobKind, until: Instant) {
        self.gates
            .entry(kind)
            .and_modify(|g| {
                g.limited = true;
                if until > g.eligible_at {
                    g.eligible_at = until;
                }
            })
            .or_insert(GateState { limited: true, eligible_at: until });
    }

    pub fn is_open(&self, kind: JobKind, now: Instant) -> bool {
        match self.gates.get(&kind) {
            Some(gate) => !gate.limited || gate.eligible_at <= now,
            None => true,
        }
    }
}
