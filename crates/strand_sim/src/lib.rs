//! Cycle-based, zero-delay logic simulator.
//!
//! A design is registered as a [`Netlist`]: a module tree of fixed-width
//! signals, connections between them, and two kinds of behavioral blocks.
//! Combinational blocks recompute outputs from inputs; clocked blocks stage
//! next values for registers.
//!
//! # Architecture
//!
//! [`Simulator::new`] elaborates the netlist once. Connected signals are
//! grouped with union-find and each group shares one storage cell. Bit-range
//! connections alias a sub-range of a cell where they can, and fall back to a
//! synthesized copy block where they cannot. A sensitivity map from cells to
//! combinational blocks drives a last-in first-out work-list that settles the
//! logic to a fixed point. [`Simulator::cycle`] runs every clocked block on
//! pre-edge values, then commits all registers at once.
//!
//! # Usage
//!
//! ```
//! use strand_common::Bits;
//! use strand_sim::{Netlist, SimConfig, Simulator};
//!
//! let mut n = Netlist::new("top");
//! let count = n.reg(n.top(), "count", 4, Some(Bits::zero(4)));
//! n.clocked("count_up", [count], move |ctx| {
//!     let v = ctx.read(count)?;
//!     ctx.next(count, &(v + 1))
//! });
//!
//! let mut sim = Simulator::new(n, &SimConfig::default())?;
//! sim.reset()?;
//! sim.cycle()?;
//! assert_eq!(sim.read_u64(count)?, 1);
//! # Ok::<(), strand_sim::SimError>(())
//! ```
//!
//! # Modules
//!
//! - `netlist` - design registration API
//! - `network` - elaboration into cells, aliases and copy blocks
//! - `scheduler` - combinational work-list
//! - `kernel` - the [`Simulator`] and settle loop
//! - `clock` - clock and reset edges
//! - `trace`, `waveform` - change reporting and VCD output
//! - `harness` - test-vector driver

#![warn(missing_docs)]

pub mod clock;
pub mod context;
pub mod error;
pub mod harness;
pub mod ids;
pub mod kernel;
pub mod metrics;
pub mod netlist;
pub mod network;
pub mod scheduler;
pub mod state;
pub mod trace;
pub mod waveform;

pub use context::{CombContext, SeqContext};
pub use error::SimError;
pub use harness::{TestVector, TestVectorSim};
pub use ids::{BlockId, CellId, ModuleId, SignalId};
pub use kernel::Simulator;
pub use metrics::{CycleStats, Phase, SimMetrics};
pub use netlist::{CombLogic, Netlist, SeqLogic, SignalKind, SignalRef};
pub use network::BuildStats;
pub use scheduler::SchedulerState;
pub use state::Location;
pub use trace::{CellChange, TraceHook, TraceLog, TraceSignal};
pub use waveform::VcdRecorder;

/// Default bound on block activations in one settle.
pub const DEFAULT_MAX_SETTLE_POPS: u64 = 100_000;

/// Configuration for a simulator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Block activations allowed in one settle before
    /// [`SimError::CombinationalLoop`] is raised.
    pub max_settle_pops: u64,
    /// Keep per-cycle statistics history in [`SimMetrics::history`].
    pub collect_metrics: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_settle_pops: DEFAULT_MAX_SETTLE_POPS,
            collect_metrics: false,
        }
    }
}
