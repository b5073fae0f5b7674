//! Per-cycle simulation statistics.
//!
//! Combinational evaluations are split by phase: the input phase covers
//! settles caused by external writes (including the settle at the start of a
//! cycle), the clock phase covers the settle after registers commit.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Which settle a combinational evaluation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Settling after external writes, before the clock edge.
    Input,
    /// Settling after registers commit.
    Clock,
}

/// Counters for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Combinational evaluations in the input phase.
    pub input_evals: u64,
    /// Combinational evaluations in the clock phase.
    pub clock_evals: u64,
    /// Blocks added to the work-list.
    pub enqueues: u64,
    /// Stores that changed a cell's value.
    pub cell_changes: u64,
    /// Register values committed at the clock edge.
    pub commits: u64,
    /// Most activations needed by a single settle.
    pub peak_settle_pops: u64,
}

impl CycleStats {
    /// Total combinational evaluations.
    pub fn evals(&self) -> u64 {
        self.input_evals + self.clock_evals
    }

    fn accumulate(&mut self, other: &CycleStats) {
        self.input_evals += other.input_evals;
        self.clock_evals += other.clock_evals;
        self.enqueues += other.enqueues;
        self.cell_changes += other.cell_changes;
        self.commits += other.commits;
        self.peak_settle_pops = self.peak_settle_pops.max(other.peak_settle_pops);
    }
}

/// Statistics for a simulator instance.
#[derive(Debug, Clone, Default)]
pub struct SimMetrics {
    collect: bool,
    current: CycleStats,
    totals: CycleStats,
    history: Vec<CycleStats>,
    cycles: u64,
    seen_enqueues: u64,
    seen_changes: u64,
}

impl SimMetrics {
    pub(crate) fn new(collect: bool) -> Self {
        Self {
            collect,
            ..Self::default()
        }
    }

    /// Counters for the cycle in progress.
    pub fn current(&self) -> &CycleStats {
        &self.current
    }

    /// Completed cycles, oldest first. Empty unless history collection is on.
    pub fn history(&self) -> &[CycleStats] {
        &self.history
    }

    /// Counters summed over every completed cycle plus the current one.
    pub fn totals(&self) -> CycleStats {
        let mut totals = self.totals;
        totals.accumulate(&self.current);
        totals
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub(crate) fn record_eval(&mut self, phase: Phase) {
        match phase {
            Phase::Input => self.current.input_evals += 1,
            Phase::Clock => self.current.clock_evals += 1,
        }
    }

    pub(crate) fn record_settle(&mut self, pops: u64) {
        self.current.peak_settle_pops = self.current.peak_settle_pops.max(pops);
    }

    pub(crate) fn record_commits(&mut self, commits: u64) {
        self.current.commits += commits;
    }

    /// Folds in running totals kept by the scheduler and the store.
    pub(crate) fn observe(&mut self, enqueues: u64, changes: u64) {
        self.current.enqueues += enqueues - self.seen_enqueues;
        self.current.cell_changes += changes - self.seen_changes;
        self.seen_enqueues = enqueues;
        self.seen_changes = changes;
    }

    pub(crate) fn end_cycle(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.totals.accumulate(&finished);
        if self.collect {
            self.history.push(finished);
        }
        self.cycles += 1;
    }

    /// Renders a short human-readable report.
    pub fn summary(&self) -> String {
        let t = self.totals();
        let per_cycle = |n: u64| {
            if self.cycles == 0 {
                0.0
            } else {
                n as f64 / self.cycles as f64
            }
        };
        let mut out = String::new();
        let _ = writeln!(out, "cycles:          {}", self.cycles);
        let _ = writeln!(
            out,
            "comb evals:      {} ({} input, {} clock, {:.1}/cycle)",
            t.evals(),
            t.input_evals,
            t.clock_evals,
            per_cycle(t.evals())
        );
        let _ = writeln!(out, "enqueues:        {}", t.enqueues);
        let _ = writeln!(out, "cell changes:    {}", t.cell_changes);
        let _ = writeln!(out, "commits:         {}", t.commits);
        let _ = write!(out, "peak settle:     {} pops", t.peak_settle_pops);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evals_split_by_phase() {
        let mut m = SimMetrics::new(false);
        m.record_eval(Phase::Input);
        m.record_eval(Phase::Clock);
        m.record_eval(Phase::Clock);
        assert_eq!(m.current().input_evals, 1);
        assert_eq!(m.current().clock_evals, 2);
        assert_eq!(m.current().evals(), 3);
    }

    #[test]
    fn observe_takes_deltas() {
        let mut m = SimMetrics::new(false);
        m.observe(5, 2);
        m.observe(8, 2);
        assert_eq!(m.current().enqueues, 8);
        assert_eq!(m.current().cell_changes, 2);
        m.end_cycle();
        m.observe(9, 4);
        assert_eq!(m.current().enqueues, 1);
        assert_eq!(m.current().cell_changes, 2);
    }

    #[test]
    fn history_only_when_collecting() {
        let mut quiet = SimMetrics::new(false);
        quiet.record_commits(2);
        quiet.end_cycle();
        assert!(quiet.history().is_empty());
        assert_eq!(quiet.totals().commits, 2);

        let mut full = SimMetrics::new(true);
        full.record_settle(4);
        full.end_cycle();
        full.record_settle(7);
        full.record_settle(3);
        full.end_cycle();
        assert_eq!(full.cycles(), 2);
        let peaks: Vec<u64> = full.history().iter().map(|s| s.peak_settle_pops).collect();
        assert_eq!(peaks, vec![4, 7]);
        assert_eq!(full.totals().peak_settle_pops, 7);
    }

    #[test]
    fn summary_mentions_counters() {
        let mut m = SimMetrics::new(false);
        m.record_eval(Phase::Input);
        m.record_commits(4);
        m.end_cycle();
        let s = m.summary();
        assert!(s.contains("cycles:          1"));
        assert!(s.contains("comb evals:      1 (1 input, 0 clock, 1.0/cycle)"));
        assert!(s.contains("commits:         4"));
    }

    #[test]
    fn stats_serialize() {
        let stats = CycleStats {
            input_evals: 3,
            ..CycleStats::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"input_evals\":3"));
        assert_eq!(serde_json::from_str::<CycleStats>(&json).unwrap(), stats);
    }
}
