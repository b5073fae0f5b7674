//! Storage cells and the resolved alias table.
//!
//! Every signal resolves to a [`Location`]: a bit range of one shared
//! [`Cell`]. All reads and writes go through [`Store`], which masks values
//! into range, records which cells changed, and keeps the write log used to
//! detect conflicting writers.

use std::collections::BTreeMap;

use strand_common::{Arena, ArenaId, Bits, WidthError};

use crate::error::SimError;
use crate::ids::{BlockId, CellId};
use crate::netlist::SignalRef;

/// A bit range `[lo, hi)` of a storage cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// The backing cell.
    pub cell: CellId,
    /// Inclusive low bit.
    pub lo: u32,
    /// Exclusive high bit.
    pub hi: u32,
}

impl Location {
    /// Width of the range in bits.
    pub fn width(&self) -> u32 {
        self.hi - self.lo
    }

    /// Returns the shared bit range if both locations overlap in the same cell.
    pub fn overlap(&self, other: &Location) -> Option<(u32, u32)> {
        if self.cell != other.cell {
            return None;
        }
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo < hi).then_some((lo, hi))
    }

    /// Returns `true` if `other` lies entirely inside this location.
    pub fn contains(&self, other: &Location) -> bool {
        self.cell == other.cell && self.lo <= other.lo && other.hi <= self.hi
    }
}

/// A unit of simulated state shared by every signal wired to it.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Current (settled or settling) value.
    pub current: Bits,
    /// Staged next value, present only for cells holding registers.
    pub pending: Option<Bits>,
}

impl Cell {
    pub(crate) fn new(width: u32) -> Self {
        Self {
            current: Bits::zero(width),
            pending: None,
        }
    }

    /// Width of the cell in bits.
    pub fn width(&self) -> u32 {
        self.current.width()
    }
}

#[derive(Debug, Clone)]
struct WriteRecord {
    writer: BlockId,
    loc: Location,
    value: Bits,
}

/// Two writers that left different values on overlapping bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteConflict {
    pub cell: CellId,
    pub lo: u32,
    pub hi: u32,
    pub first: BlockId,
    pub second: BlockId,
}

/// Latest value written by each block to each location.
///
/// Records outlive the settle that produced them: a block that does not
/// re-run still drives what it last wrote. A block's records are replaced
/// only when it runs again.
#[derive(Debug, Default)]
pub(crate) struct WriteLog {
    by_cell: BTreeMap<CellId, Vec<WriteRecord>>,
    cells_by_writer: BTreeMap<BlockId, Vec<CellId>>,
}

impl WriteLog {
    /// Drops every record left by `writer`, ahead of it running again.
    pub fn forget(&mut self, writer: BlockId) {
        let Some(cells) = self.cells_by_writer.remove(&writer) else {
            return;
        };
        for cell in cells {
            if let Some(records) = self.by_cell.get_mut(&cell) {
                records.retain(|r| r.writer != writer);
                if records.is_empty() {
                    self.by_cell.remove(&cell);
                }
            }
        }
    }

    pub fn record(&mut self, writer: BlockId, loc: Location, value: Bits) {
        let cells = self.cells_by_writer.entry(writer).or_default();
        if !cells.contains(&loc.cell) {
            cells.push(loc.cell);
        }
        let records = self.by_cell.entry(loc.cell).or_default();
        match records
            .iter_mut()
            .find(|r| r.writer == writer && r.loc == loc)
        {
            Some(existing) => existing.value = value,
            None => records.push(WriteRecord { writer, loc, value }),
        }
    }

    /// Checks that overlapping writes from different blocks agree bit for bit.
    pub fn verify(&self) -> Result<(), WriteConflict> {
        for records in self.by_cell.values() {
            for (i, a) in records.iter().enumerate() {
                for b in &records[i + 1..] {
                    if a.writer == b.writer {
                        continue;
                    }
                    let Some((lo, hi)) = a.loc.overlap(&b.loc) else {
                        continue;
                    };
                    let va = a.value.slice(lo - a.loc.lo, hi - a.loc.lo);
                    let vb = b.value.slice(lo - b.loc.lo, hi - b.loc.lo);
                    if va != vb {
                        return Err(WriteConflict {
                            cell: a.loc.cell,
                            lo,
                            hi,
                            first: a.writer,
                            second: b.writer,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Owner of all cells and of the signal-to-location table.
#[derive(Debug)]
pub(crate) struct Store {
    pub cells: Arena<CellId, Cell>,
    /// Resolved location of every declared signal, indexed by `SignalId`.
    pub locations: Vec<Location>,
    /// Hierarchical signal names, indexed by `SignalId`.
    pub paths: Vec<String>,
    /// Cells changed since the scheduler was last notified.
    pub changed: Vec<CellId>,
    /// Cells changed since the last trace report.
    dirty: Vec<bool>,
    dirty_cells: Vec<CellId>,
    /// Total number of value-changing stores.
    pub changes: u64,
    pub log: WriteLog,
}

impl Store {
    pub fn new(cells: Arena<CellId, Cell>, locations: Vec<Location>, paths: Vec<String>) -> Self {
        let n = cells.len();
        Self {
            cells,
            locations,
            paths,
            changed: Vec::new(),
            dirty: vec![false; n],
            dirty_cells: Vec::new(),
            changes: 0,
            log: WriteLog::default(),
        }
    }

    /// Resolves a reference to its physical location.
    pub fn resolve(&self, r: SignalRef) -> Result<Location, SimError> {
        let base = *self
            .locations
            .get(r.signal().index())
            .ok_or_else(|| SimError::UnconnectedRead {
                signal: r.to_string(),
            })?;
        match r {
            SignalRef::Whole(_) => Ok(base),
            SignalRef::Range { lo, hi, .. } => {
                if lo >= hi || hi > base.width() {
                    return Err(SimError::InvalidReference {
                        reason: format!(
                            "range [{lo}:{hi}] is outside `{}` of width {}",
                            self.describe(r),
                            base.width()
                        ),
                    });
                }
                Ok(Location {
                    cell: base.cell,
                    lo: base.lo + lo,
                    hi: base.lo + hi,
                })
            }
        }
    }

    /// Renders a reference with its hierarchical name.
    pub fn describe(&self, r: SignalRef) -> String {
        let Some(path) = self.paths.get(r.signal().index()) else {
            return r.to_string();
        };
        match r {
            SignalRef::Whole(_) => path.clone(),
            SignalRef::Range { lo, hi, .. } if hi == lo + 1 => format!("{path}[{lo}]"),
            SignalRef::Range { lo, hi, .. } => format!("{path}[{lo}:{hi}]"),
        }
    }

    pub fn load(&self, loc: Location) -> Bits {
        self.cells[loc.cell].current.slice(loc.lo, loc.hi)
    }

    /// Writes `value` into the current value at `loc`. Returns `true` if the
    /// cell changed.
    pub fn store(&mut self, loc: Location, value: &Bits, trunc: bool) -> Result<bool, SimError> {
        let cell = &mut self.cells[loc.cell];
        let before = cell.current.slice(loc.lo, loc.hi);
        write_range(&mut cell.current, loc, value, trunc)?;
        if cell.current.slice(loc.lo, loc.hi) == before {
            return Ok(false);
        }
        self.changes += 1;
        self.changed.push(loc.cell);
        let idx = loc.cell.index();
        if !self.dirty[idx] {
            self.dirty[idx] = true;
            self.dirty_cells.push(loc.cell);
        }
        Ok(true)
    }

    /// Writes `value` into the staged next value at `loc`.
    pub fn stage(&mut self, loc: Location, value: &Bits, trunc: bool) -> Result<(), SimError> {
        match self.cells[loc.cell].pending.as_mut() {
            Some(pending) => write_range(pending, loc, value, trunc),
            None => Err(SimError::InvalidReference {
                reason: format!("cell {} holds no register", loc.cell.as_raw()),
            }),
        }
    }

    /// Loads the staged next value at `loc`.
    pub fn load_pending(&self, loc: Location) -> Option<Bits> {
        self.cells[loc.cell]
            .pending
            .as_ref()
            .map(|p| p.slice(loc.lo, loc.hi))
    }

    /// Re-seeds every register cell's next value from its current value.
    pub fn seed_pending(&mut self) {
        for (_, cell) in self.cells.iter_mut() {
            if let Some(pending) = cell.pending.as_mut() {
                pending.clone_from(&cell.current);
            }
        }
    }

    /// Takes the cells changed since the last call, in change order.
    pub fn take_changed(&mut self) -> Vec<CellId> {
        std::mem::take(&mut self.changed)
    }

    /// Takes the cells changed since the last trace report.
    pub fn take_dirty(&mut self) -> Vec<CellId> {
        for cell in &self.dirty_cells {
            self.dirty[cell.index()] = false;
        }
        std::mem::take(&mut self.dirty_cells)
    }
}

fn write_range(target: &mut Bits, loc: Location, value: &Bits, trunc: bool) -> Result<(), SimError> {
    let result = if trunc {
        target.set_slice_trunc(loc.lo, loc.hi, value)
    } else {
        target.set_slice(loc.lo, loc.hi, value)
    };
    result.map_err(|e| match e {
        WidthError::ValueTooWide {
            value, required, ..
        } => SimError::Width(WidthError::ValueTooWide {
            value,
            required,
            width: loc.width(),
        }),
        other => SimError::Width(other),
    })
}
