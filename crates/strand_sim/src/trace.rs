//! Per-cycle trace hook.
//!
//! A [`TraceHook`] receives the list of traceable signals once when it is
//! attached, then the set of changed cells after every clock edge. Changes
//! are reported per cell; a hook maps them back to signals through each
//! signal's `cell` and bit range.

use std::cell::RefCell;
use std::rc::Rc;

use strand_common::Bits;

use crate::error::SimError;
use crate::ids::CellId;

/// A signal as seen by a trace consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSignal {
    /// Module names from the top down to the owning module.
    pub scope: Vec<String>,
    /// Local signal name.
    pub name: String,
    /// Width in bits.
    pub width: u32,
    /// Backing cell.
    pub cell: CellId,
    /// Low bit of the signal within its cell.
    pub lo: u32,
    /// Value when the hook was attached.
    pub initial: Bits,
}

impl TraceSignal {
    /// Extracts this signal's bits from a full cell value.
    pub fn value_in(&self, cell_value: &Bits) -> Bits {
        cell_value.slice(self.lo, self.lo + self.width)
    }
}

/// The new value of a cell that changed since the previous report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellChange {
    /// The cell.
    pub cell: CellId,
    /// Its full current value.
    pub value: Bits,
}

/// Consumer of per-cycle value changes.
pub trait TraceHook {
    /// Called once when the hook is attached.
    fn on_start(&mut self, signals: &[TraceSignal]) -> Result<(), SimError>;

    /// Called after every `cycle()` or `reset()` with the number of edges so
    /// far and the cells whose value differs from the previous report.
    fn on_cycle(&mut self, cycle: u64, changes: &[CellChange]) -> Result<(), SimError>;

    /// Called when the hook is detached.
    fn finish(&mut self) -> Result<(), SimError> {
        Ok(())
    }
}

/// Shared handles forward to the inner hook, so a caller can keep access to
/// a hook it has attached.
impl<T: TraceHook> TraceHook for Rc<RefCell<T>> {
    fn on_start(&mut self, signals: &[TraceSignal]) -> Result<(), SimError> {
        self.borrow_mut().on_start(signals)
    }

    fn on_cycle(&mut self, cycle: u64, changes: &[CellChange]) -> Result<(), SimError> {
        self.borrow_mut().on_cycle(cycle, changes)
    }

    fn finish(&mut self) -> Result<(), SimError> {
        self.borrow_mut().finish()
    }
}

/// A hook that keeps everything it is told, for inspection in tests and tools.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    /// Signals reported at attach time.
    pub signals: Vec<TraceSignal>,
    /// `(cycle, changes)` for every report.
    pub cycles: Vec<(u64, Vec<CellChange>)>,
    /// Whether `finish` was called.
    pub finished: bool,
}

impl TraceLog {
    /// Returns the value of the named signal after `cycle`, replaying changes.
    pub fn value_at(&self, name: &str, cycle: u64) -> Option<Bits> {
        let signal = self.signals.iter().find(|s| s.name == name)?;
        let mut value = signal.initial.clone();
        for (c, changes) in &self.cycles {
            if *c > cycle {
                break;
            }
            if let Some(change) = changes.iter().find(|ch| ch.cell == signal.cell) {
                value = signal.value_in(&change.value);
            }
        }
        Some(value)
    }
}

impl TraceHook for TraceLog {
    fn on_start(&mut self, signals: &[TraceSignal]) -> Result<(), SimError> {
        self.signals = signals.to_vec();
        Ok(())
    }

    fn on_cycle(&mut self, cycle: u64, changes: &[CellChange]) -> Result<(), SimError> {
        self.cycles.push((cycle, changes.to_vec()));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SimError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(name: &str, lo: u32, width: u32) -> TraceSignal {
        TraceSignal {
            scope: vec!["top".into()],
            name: name.into(),
            width,
            cell: CellId::from_raw(0),
            lo,
            initial: Bits::zero(width),
        }
    }

    #[test]
    fn value_in_slices_cell() {
        let s = signal("hi", 4, 4);
        assert_eq!(s.value_in(&Bits::new(8, 0xA5).unwrap()).as_u64(), 0xA);
    }

    #[test]
    fn trace_log_replays_changes() {
        let mut log = TraceLog::default();
        log.on_start(&[signal("lo", 0, 4)]).unwrap();
        let change = |v| CellChange {
            cell: CellId::from_raw(0),
            value: Bits::new(8, v).unwrap(),
        };
        log.on_cycle(1, &[change(0x13)]).unwrap();
        log.on_cycle(2, &[]).unwrap();
        log.on_cycle(3, &[change(0x27)]).unwrap();
        assert_eq!(log.value_at("lo", 0).unwrap().as_u64(), 0);
        assert_eq!(log.value_at("lo", 2).unwrap().as_u64(), 3);
        assert_eq!(log.value_at("lo", 3).unwrap().as_u64(), 7);
        assert_eq!(log.value_at("missing", 3), None);
    }

    #[test]
    fn shared_handle_forwards() {
        let shared = Rc::new(RefCell::new(TraceLog::default()));
        let mut hook: Box<dyn TraceHook> = Box::new(Rc::clone(&shared));
        hook.on_start(&[signal("x", 0, 1)]).unwrap();
        hook.finish().unwrap();
        assert_eq!(shared.borrow().signals.len(), 1);
        assert!(shared.borrow().finished);
    }
}
