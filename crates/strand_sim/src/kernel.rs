//! Simulation kernel.
//!
//! [`Simulator`] owns the built network and drives combinational logic to a
//! fixed point. Every combinational block is queued at construction, so the
//! first settle evaluates each one at least once. External writes queue the
//! blocks sensitive to the written cell; nothing runs until the next settle.
//!
//! A settle pops blocks until the work-list is empty. If it needs more than
//! `max_settle_pops` activations it stops with
//! [`SimError::CombinationalLoop`]. At the end of every settle, overlapping
//! writes from different blocks must agree or [`SimError::Overlap`] is
//! returned. A block that did not run keeps driving what it last wrote.

use std::collections::HashMap;

use strand_common::{Arena, ArenaId, Bits};
use tracing::{trace, warn};

use crate::context::CombContext;
use crate::error::SimError;
use crate::ids::{BlockId, CellId, ModuleId, SignalId};
use crate::metrics::{Phase, SimMetrics};
use crate::netlist::{Netlist, SignalRef};
use crate::network::{self, Block, BlockKind, BuildStats, Register};
use crate::scheduler::{Scheduler, SchedulerState};
use crate::state::{Location, Store};
use crate::trace::{CellChange, TraceHook, TraceSignal};
use crate::SimConfig;

/// A cycle-based simulator for one netlist.
pub struct Simulator {
    pub(crate) netlist: Netlist,
    pub(crate) store: Store,
    pub(crate) blocks: Arena<BlockId, Block>,
    pub(crate) scheduler: Scheduler,
    pub(crate) registers: Vec<Register>,
    pub(crate) clocked_order: Vec<BlockId>,
    pub(crate) phase: Phase,
    pub(crate) ncycles: u64,
    pub(crate) metrics: SimMetrics,
    pub(crate) hook: Option<Box<dyn TraceHook>>,
    reported: Vec<Bits>,
    stats: BuildStats,
    names: HashMap<String, SignalId>,
    max_settle_pops: u64,
    pop_counts: Vec<u64>,
}

impl Simulator {
    /// Builds the signal network for `netlist` and primes every
    /// combinational block.
    pub fn new(mut netlist: Netlist, config: &SimConfig) -> Result<Self, SimError> {
        let network = network::build(&mut netlist)?;
        let mut scheduler = Scheduler::new(network.blocks.len(), network.sensitivity);
        // Reverse so the first settle pops blocks in declaration order.
        for &id in network.comb_order.iter().rev() {
            scheduler.enqueue(id);
        }
        let names = netlist
            .signals
            .ids()
            .map(|s| (netlist.signal_path(s), s))
            .collect();
        let pop_counts = vec![0; network.blocks.len()];
        Ok(Self {
            netlist,
            store: network.store,
            blocks: network.blocks,
            scheduler,
            registers: network.registers,
            clocked_order: network.clocked_order,
            phase: Phase::Input,
            ncycles: 0,
            metrics: SimMetrics::new(config.collect_metrics),
            hook: None,
            reported: Vec::new(),
            stats: network.stats,
            names,
            max_settle_pops: config.max_settle_pops.max(1),
            pop_counts,
        })
    }

    /// Returns the value at `r`.
    pub fn read(&self, r: impl Into<SignalRef>) -> Result<Bits, SimError> {
        let loc = self.store.resolve(r.into())?;
        Ok(self.store.load(loc))
    }

    /// Returns the low 64 bits of the value at `r`.
    pub fn read_u64(&self, r: impl Into<SignalRef>) -> Result<u64, SimError> {
        Ok(self.read(r)?.as_u64())
    }

    /// Writes `value` to `r`, failing if it does not fit.
    ///
    /// Dependent blocks are queued but do not run until the next settle.
    pub fn write(&mut self, r: impl Into<SignalRef>, value: &Bits) -> Result<(), SimError> {
        self.write_with(r.into(), value, false)
    }

    /// Writes an unsigned integer to `r`, failing if it does not fit.
    pub fn write_u64(&mut self, r: impl Into<SignalRef>, value: u64) -> Result<(), SimError> {
        self.write_with(r.into(), &Bits::fitting(value), false)
    }

    /// Writes the low bits of `value` to `r`.
    pub fn write_trunc(&mut self, r: impl Into<SignalRef>, value: &Bits) -> Result<(), SimError> {
        self.write_with(r.into(), value, true)
    }

    /// Settles combinational logic without advancing registers.
    pub fn eval_combinational(&mut self) -> Result<(), SimError> {
        self.phase = Phase::Input;
        self.drain()
    }

    /// Looks up a signal by hierarchical name, e.g. `top.adder.sum`.
    pub fn find(&self, path: &str) -> Option<SignalId> {
        self.names.get(path).copied()
    }

    /// Returns the hierarchical name of a signal.
    pub fn signal_path(&self, signal: SignalId) -> String {
        self.netlist.signal_path(signal)
    }

    /// Returns the width of `r` in bits.
    pub fn width_of(&self, r: impl Into<SignalRef>) -> Result<u32, SimError> {
        Ok(self.store.resolve(r.into())?.width())
    }

    /// Returns the storage location backing `r`.
    pub fn location(&self, r: impl Into<SignalRef>) -> Result<Location, SimError> {
        self.store.resolve(r.into())
    }

    /// Returns the number of clock edges taken, resets included.
    pub fn ncycles(&self) -> u64 {
        self.ncycles
    }

    /// Returns the scheduler micro-state.
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Returns statistics gathered so far.
    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    /// Returns counts from network construction.
    pub fn build_stats(&self) -> BuildStats {
        self.stats
    }

    /// Returns the number of storage cells.
    pub fn cell_count(&self) -> usize {
        self.store.cells.len()
    }

    /// Returns the number of declared signals.
    pub fn signal_count(&self) -> usize {
        self.netlist.signal_count()
    }

    /// Returns the names of the blocks sensitive to `cell`.
    pub fn sensitive_blocks(&self, cell: CellId) -> Vec<&str> {
        self.scheduler
            .sensitive_to(cell)
            .iter()
            .map(|&b| self.blocks[b].name.as_str())
            .collect()
    }

    /// Attaches a trace hook, replacing any previous one without finishing it.
    pub fn set_trace_hook(&mut self, mut hook: Box<dyn TraceHook>) -> Result<(), SimError> {
        hook.on_start(&self.trace_signals())?;
        self.reported = self.store.cells.values().map(|c| c.current.clone()).collect();
        self.store.take_dirty();
        self.hook = Some(hook);
        Ok(())
    }

    /// Detaches the trace hook after calling its `finish`.
    pub fn finish_trace(&mut self) -> Result<Option<Box<dyn TraceHook>>, SimError> {
        match self.hook.take() {
            Some(mut hook) => {
                hook.finish()?;
                Ok(Some(hook))
            }
            None => Ok(None),
        }
    }

    /// Signals in hierarchy order: each module's signals in declaration
    /// order, followed by its submodules depth-first.
    pub fn trace_signals(&self) -> Vec<TraceSignal> {
        let mut children: HashMap<ModuleId, Vec<ModuleId>> = HashMap::new();
        for (id, m) in self.netlist.modules.iter() {
            if let Some(parent) = m.parent {
                children.entry(parent).or_default().push(id);
            }
        }
        let mut by_module: HashMap<ModuleId, Vec<SignalId>> = HashMap::new();
        for (id, s) in self.netlist.signals.iter() {
            by_module.entry(s.module).or_default().push(id);
        }

        let mut out = Vec::with_capacity(self.netlist.signal_count());
        let mut stack = vec![self.netlist.top()];
        while let Some(module) = stack.pop() {
            let scope = self.netlist.scope(module);
            for &signal in by_module.get(&module).into_iter().flatten() {
                let decl = &self.netlist.signals[signal];
                let loc = self.store.locations[signal.index()];
                out.push(TraceSignal {
                    scope: scope.clone(),
                    name: self.netlist.interner.resolve(decl.name).to_string(),
                    width: decl.width,
                    cell: loc.cell,
                    lo: loc.lo,
                    initial: self.store.load(loc),
                });
            }
            if let Some(kids) = children.get(&module) {
                stack.extend(kids.iter().rev());
            }
        }
        out
    }

    fn write_with(&mut self, r: SignalRef, value: &Bits, trunc: bool) -> Result<(), SimError> {
        let loc = self.store.resolve(r)?;
        self.store.store(loc, value, trunc)?;
        self.flush_changes();
        self.sync_metrics();
        Ok(())
    }

    /// Queues the blocks sensitive to every cell changed since the last call.
    pub(crate) fn flush_changes(&mut self) {
        for cell in self.store.take_changed() {
            self.scheduler.notify(cell);
        }
    }

    pub(crate) fn sync_metrics(&mut self) {
        self.metrics
            .observe(self.scheduler.enqueues(), self.store.changes);
    }

    /// Runs queued blocks until the work-list is empty.
    pub(crate) fn drain(&mut self) -> Result<(), SimError> {
        if self.scheduler.is_idle() {
            return Ok(());
        }
        self.pop_counts.fill(0);
        let mut pops: u64 = 0;
        while let Some(id) = self.scheduler.pop() {
            if pops >= self.max_settle_pops {
                return Err(self.loop_error(pops, id));
            }
            pops += 1;
            self.pop_counts[id.index()] += 1;
            self.metrics.record_eval(self.phase);
            self.activate(id)?;
            self.flush_changes();
        }
        self.metrics.record_settle(pops);
        self.sync_metrics();
        if let Err(conflict) = self.store.log.verify() {
            let writers = vec![
                self.blocks[conflict.first].name.clone(),
                self.blocks[conflict.second].name.clone(),
            ];
            warn!(
                cell = conflict.cell.as_raw(),
                lo = conflict.lo,
                hi = conflict.hi,
                writers = ?writers,
                "overlapping combinational writers disagree"
            );
            return Err(SimError::Overlap {
                cell: conflict.cell.as_raw(),
                lo: conflict.lo,
                hi: conflict.hi,
                writers,
            });
        }
        Ok(())
    }

    fn activate(&mut self, id: BlockId) -> Result<(), SimError> {
        let block = &mut self.blocks[id];
        trace!(block = %block.name, "activate");
        self.store.log.forget(id);
        match &mut block.kind {
            BlockKind::Comb(logic) => {
                let mut ctx = CombContext::new(&mut self.store, id);
                logic.eval(&mut ctx)
            }
            BlockKind::Copy { src, dst } => {
                let value = self.store.load(*src);
                self.store.store(*dst, &value, false)?;
                self.store.log.record(id, *dst, value);
                Ok(())
            }
            BlockKind::Seq { .. } => Ok(()),
        }
    }

    fn loop_error(&self, pops: u64, popped: BlockId) -> SimError {
        let name = |b: BlockId| self.blocks[b].name.clone();
        let mut pending = vec![name(popped)];
        pending.extend(self.scheduler.pending().map(name));
        let busiest = self
            .pop_counts
            .iter()
            .enumerate()
            .max_by_key(|&(i, n)| (*n, std::cmp::Reverse(i)))
            .map(|(i, _)| name(BlockId::from_raw(i as u32)))
            .unwrap_or_default();
        warn!(
            pops,
            busiest = %busiest,
            pending = ?pending,
            "combinational logic did not settle"
        );
        SimError::CombinationalLoop {
            pops,
            pending,
            busiest,
        }
    }

    /// Sends changed cells to the trace hook, if one is attached.
    pub(crate) fn report(&mut self) -> Result<(), SimError> {
        let mut dirty = self.store.take_dirty();
        let Some(hook) = self.hook.as_mut() else {
            return Ok(());
        };
        dirty.sort_unstable();
        let mut changes = Vec::with_capacity(dirty.len());
        for cell in dirty {
            let value = &self.store.cells[cell].current;
            let last = &mut self.reported[cell.index()];
            if last != value {
                last.clone_from(value);
                changes.push(CellChange {
                    cell,
                    value: value.clone(),
                });
            }
        }
        hook.on_cycle(self.ncycles, &changes)
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("cells", &self.store.cells.len())
            .field("blocks", &self.blocks.len())
            .field("registers", &self.registers.len())
            .field("ncycles", &self.ncycles)
            .field("state", &self.scheduler.state())
            .finish()
    }
}
