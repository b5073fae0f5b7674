//! Clock driver.
//!
//! One edge runs four steps:
//!
//! 1. settle combinational logic left over from external writes;
//! 2. run every clocked block once in declaration order, each reading
//!    pre-edge values and staging next values;
//! 3. commit every register's staged value (or its reset value) at once;
//! 4. settle again so downstream logic sees the new register state.
//!
//! Every register cell's staged value starts as its current value, so a
//! register no block writes in a cycle holds its value.

use tracing::trace;

use crate::context::SeqContext;
use crate::error::SimError;
use crate::kernel::Simulator;
use crate::metrics::Phase;
use crate::network::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Clock,
    Reset,
}

impl Simulator {
    /// Advances one clock cycle.
    pub fn cycle(&mut self) -> Result<(), SimError> {
        self.edge(Edge::Clock)
    }

    /// Takes one clock edge that forces every register with a declared reset
    /// value to that value. Registers without one take their staged value.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.edge(Edge::Reset)
    }

    fn edge(&mut self, edge: Edge) -> Result<(), SimError> {
        self.phase = Phase::Input;
        self.drain()?;

        self.store.seed_pending();
        for &id in &self.clocked_order {
            let block = &mut self.blocks[id];
            if let BlockKind::Seq { logic, writes } = &mut block.kind {
                trace!(block = %block.name, "tick");
                let mut ctx = SeqContext::new(&mut self.store, &block.name, writes.as_slice());
                logic.tick(&mut ctx)?;
            }
        }

        let staged: Vec<_> = self
            .registers
            .iter()
            .map(|reg| {
                let value = match (edge, &reg.reset) {
                    (Edge::Reset, Some(reset)) => reset.clone(),
                    _ => self
                        .store
                        .load_pending(reg.loc)
                        .unwrap_or_else(|| self.store.load(reg.loc)),
                };
                (reg.loc, value)
            })
            .collect();
        for (loc, value) in &staged {
            trace!(cell = loc.cell.as_raw(), lo = loc.lo, hi = loc.hi, value = %value, "commit");
            self.store.store(*loc, value, false)?;
        }
        self.metrics.record_commits(staged.len() as u64);
        self.flush_changes();

        self.phase = Phase::Clock;
        self.drain()?;
        self.phase = Phase::Input;

        self.ncycles += 1;
        self.sync_metrics();
        self.metrics.end_cycle();
        self.report()
    }
}

#[cfg(test)]
mod tests {
    use strand_common::Bits;

    use crate::netlist::Netlist;
    use crate::{SimConfig, SimError, Simulator};

    fn counter(width: u32) -> (Simulator, crate::SignalId) {
        let mut n = Netlist::new("top");
        let count = n.reg(n.top(), "count", width, Some(Bits::zero(width)));
        n.clocked("count_up", [count], move |ctx| {
            let v = ctx.read(count)?;
            ctx.next(count, &(v + 1))
        });
        (Simulator::new(n, &SimConfig::default()).unwrap(), count)
    }

    // ---- Register commit ----

    #[test]
    fn cycle_advances_register() {
        let (mut sim, count) = counter(4);
        sim.reset().unwrap();
        assert_eq!(sim.read_u64(count).unwrap(), 0);
        sim.cycle().unwrap();
        sim.cycle().unwrap();
        assert_eq!(sim.read_u64(count).unwrap(), 2);
        assert_eq!(sim.ncycles(), 3);
    }

    #[test]
    fn register_wraps_at_width() {
        let (mut sim, count) = counter(2);
        for _ in 0..5 {
            sim.cycle().unwrap();
        }
        assert_eq!(sim.read_u64(count).unwrap(), 1);
    }

    #[test]
    fn unwritten_register_holds_value() {
        let mut n = Netlist::new("top");
        let en = n.in_port(n.top(), "en", 1);
        let r = n.reg(n.top(), "r", 4, Some(Bits::new(4, 7).unwrap()));
        n.clocked("maybe", [r], move |ctx| {
            if ctx.read_bool(en)? {
                let v = ctx.read(r)?;
                ctx.next(r, &(v + 1))?;
            }
            Ok(())
        });
        let mut sim = Simulator::new(n, &SimConfig::default()).unwrap();
        sim.reset().unwrap();
        sim.cycle().unwrap();
        assert_eq!(sim.read_u64(r).unwrap(), 7);
        sim.write_u64(en, 1).unwrap();
        sim.cycle().unwrap();
        assert_eq!(sim.read_u64(r).unwrap(), 8);
    }

    #[test]
    fn reset_without_value_takes_staged_value() {
        let mut n = Netlist::new("top");
        let d = n.in_port(n.top(), "d", 4);
        let q = n.reg(n.top(), "q", 4, None);
        n.clocked("flop", [q], move |ctx| {
            let v = ctx.read(d)?;
            ctx.next(q, &v)
        });
        let mut sim = Simulator::new(n, &SimConfig::default()).unwrap();
        sim.write_u64(d, 9).unwrap();
        sim.reset().unwrap();
        assert_eq!(sim.read_u64(q).unwrap(), 9);
    }

    #[test]
    fn downstream_logic_settles_after_commit() {
        let mut n = Netlist::new("top");
        let r = n.reg(n.top(), "r", 4, Some(Bits::zero(4)));
        let twice = n.out_port(n.top(), "twice", 5);
        n.clocked("inc", [r], move |ctx| {
            let v = ctx.read(r)?;
            ctx.next(r, &(v + 1))
        });
        n.combinational("double", [r], move |ctx| {
            let v = ctx.read(r)?.zext(5)?;
            ctx.write(twice, &(&v + &v))
        });
        let mut sim = Simulator::new(n, &SimConfig::default()).unwrap();
        sim.reset().unwrap();
        sim.cycle().unwrap();
        sim.cycle().unwrap();
        sim.cycle().unwrap();
        assert_eq!(sim.read_u64(twice).unwrap(), 6);
    }

    // ---- Write-set checks ----

    #[test]
    fn clocked_write_outside_declared_set_fails() {
        let mut n = Netlist::new("top");
        let a = n.reg(n.top(), "a", 1, None);
        let b = n.reg(n.top(), "b", 1, None);
        n.clocked("sneaky", [a], move |ctx| ctx.next_u64(b, 1));
        let mut sim = Simulator::new(n, &SimConfig::default()).unwrap();
        let err = sim.cycle().unwrap_err();
        assert!(matches!(err, SimError::UndeclaredWrite { ref block, .. } if block == "sneaky"));
    }

    #[test]
    fn clocked_write_set_must_be_registers() {
        let mut n = Netlist::new("top");
        let w = n.wire(n.top(), "w", 1);
        n.clocked("bad", [w], |_ctx| Ok(()));
        let err = Simulator::new(n, &SimConfig::default()).unwrap_err();
        assert!(matches!(err, SimError::NotARegister { ref signal, .. } if signal == "top.w"));
    }

    #[test]
    fn overlapping_clocked_write_sets_fail_at_build() {
        let mut n = Netlist::new("top");
        let r = n.reg(n.top(), "r", 8, None);
        n.clocked("low", [r.slice(0, 5)], |_ctx| Ok(()));
        n.clocked("high", [r.slice(4, 8)], |_ctx| Ok(()));
        let err = Simulator::new(n, &SimConfig::default()).unwrap_err();
        match err {
            SimError::Overlap { lo, hi, writers, .. } => {
                assert_eq!((lo, hi), (4, 5));
                assert_eq!(writers, vec!["low".to_string(), "high".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn disjoint_slices_of_one_register() {
        let mut n = Netlist::new("top");
        let r = n.reg(n.top(), "r", 8, Some(Bits::zero(8)));
        n.clocked("low", [r.slice(0, 4)], move |ctx| ctx.next_u64(r.slice(0, 4), 0xA));
        n.clocked("high", [r.slice(4, 8)], move |ctx| ctx.next_u64(r.slice(4, 8), 0x5));
        let mut sim = Simulator::new(n, &SimConfig::default()).unwrap();
        sim.cycle().unwrap();
        assert_eq!(sim.read_u64(r).unwrap(), 0x5A);
    }

    #[test]
    fn reset_value_must_fit() {
        let mut n = Netlist::new("top");
        n.reg(n.top(), "r", 2, Some(Bits::new(4, 8).unwrap()));
        let err = Simulator::new(n, &SimConfig::default()).unwrap_err();
        assert!(matches!(err, SimError::Width(_)));
    }
}
