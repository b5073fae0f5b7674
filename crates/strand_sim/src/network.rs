//! Signal network construction.
//!
//! Turns a [`Netlist`] into the minimal set of shared storage cells:
//!
//! 1. Connections are ordered leaves-first (deepest owning module first,
//!    declaration order within a depth).
//! 2. Whole-to-whole connections are merged with a disjoint-set union. Each
//!    resulting group has the width of its widest member; narrower members
//!    address the group's low bits.
//! 3. A range-to-whole connection makes the whole side's group an alias of
//!    the addressed sub-range, so it shares the ranged group's storage.
//!    Aliases may nest. When aliasing is impossible (the group is already an
//!    alias, is wider than the range, or would alias itself) the connection
//!    falls back to a synthesized copy block.
//! 4. Range-to-range connections that resolve to the same bits need nothing;
//!    any other pair becomes a copy block.
//! 5. One cell is created per group that is not an alias. Constants seed
//!    their cells, registers get a staged next value, and combinational read
//!    sets become the sensitivity map.

use std::cmp::Reverse;

use petgraph::unionfind::UnionFind;
use strand_common::{Arena, ArenaId, Bits, WidthError};
use tracing::{debug, warn};

use crate::error::SimError;
use crate::ids::{BlockId, CellId, SignalId};
use crate::netlist::{BlockLogic, CombLogic, Netlist, SeqLogic, SignalKind, SignalRef};
use crate::state::{Cell, Location, Store};

/// Counts describing a built network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Declared signals.
    pub signals: usize,
    /// Storage cells created.
    pub cells: usize,
    /// Groups folded into another group's sub-range.
    pub aliases: usize,
    /// Synthesized slice-copy blocks.
    pub copies: usize,
    /// Declared registers.
    pub registers: usize,
    /// Combinational blocks, including copies.
    pub comb_blocks: usize,
    /// Clocked blocks.
    pub clocked_blocks: usize,
}

pub(crate) enum BlockKind {
    Comb(Box<dyn CombLogic>),
    Seq {
        logic: Box<dyn SeqLogic>,
        writes: Vec<Location>,
    },
    Copy {
        src: Location,
        dst: Location,
    },
}

pub(crate) struct Block {
    pub name: String,
    pub kind: BlockKind,
}

/// A register resolved to its storage.
#[derive(Debug, Clone)]
pub(crate) struct Register {
    pub name: String,
    pub loc: Location,
    pub reset: Option<Bits>,
}

/// The built network: storage, blocks and the sensitivity map.
pub(crate) struct Network {
    pub store: Store,
    pub blocks: Arena<BlockId, Block>,
    /// Combinational blocks sensitive to each cell, indexed by `CellId`.
    pub sensitivity: Vec<Vec<BlockId>>,
    pub registers: Vec<Register>,
    pub comb_order: Vec<BlockId>,
    pub clocked_order: Vec<BlockId>,
    pub stats: BuildStats,
}

/// Builds the network, taking the blocks out of `netlist`.
///
/// The netlist keeps its names and hierarchy for later lookups.
pub(crate) fn build(netlist: &mut Netlist) -> Result<Network, SimError> {
    check_signals(netlist)?;
    for conn in &netlist.connections {
        check_ref(netlist, conn.a)?;
        check_ref(netlist, conn.b)?;
    }

    let order = connection_order(netlist);
    let groups = Groups::new(netlist);
    let mut builder = AliasBuilder::new(groups);
    let mut copies = Vec::new();
    for &i in &order {
        let conn = netlist.connections[i];
        if let Some(copy) = builder.connect(netlist, conn.a, conn.b)? {
            copies.push(copy);
        }
    }

    let (cells, locations) = builder.materialize(netlist);
    let paths = netlist
        .signals
        .ids()
        .map(|s| netlist.signal_path(s))
        .collect();
    let mut store = Store::new(cells, locations, paths);
    seed_constants(netlist, &mut store)?;
    let registers = declare_registers(netlist, &mut store)?;

    let decls = std::mem::take(&mut netlist.blocks);
    let mut blocks: Arena<BlockId, Block> = Arena::new();
    let mut sensitivity = vec![Vec::new(); store.cells.len()];
    let mut comb_order = Vec::new();
    let mut clocked_order = Vec::new();

    for (id, decl) in decls.into_entries() {
        let locs = decl
            .refs
            .iter()
            .map(|r| {
                check_ref(netlist, *r)?;
                store.resolve(*r)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let kind = match decl.logic {
            BlockLogic::Combinational(logic) => {
                for loc in &locs {
                    subscribe(&mut sensitivity, loc.cell, id);
                }
                comb_order.push(id);
                BlockKind::Comb(logic)
            }
            BlockLogic::Clocked(logic) => {
                for (r, loc) in decl.refs.iter().zip(&locs) {
                    if !registers.iter().any(|reg| reg.loc.contains(loc)) {
                        return Err(SimError::NotARegister {
                            block: decl.name.clone(),
                            signal: store.describe(*r),
                        });
                    }
                }
                clocked_order.push(id);
                BlockKind::Seq {
                    logic,
                    writes: locs,
                }
            }
        };
        blocks.alloc(Block {
            name: decl.name,
            kind,
        });
    }
    check_clocked_overlap(&blocks, &clocked_order)?;

    let mut copy_count = 0;
    for (src_ref, dst_ref) in copies {
        let src = store.resolve(src_ref)?;
        let dst = store.resolve(dst_ref)?;
        if src == dst {
            continue;
        }
        let id = blocks.alloc(Block {
            name: format!("slice${copy_count}"),
            kind: BlockKind::Copy { src, dst },
        });
        copy_count += 1;
        subscribe(&mut sensitivity, src.cell, id);
        comb_order.push(id);
    }

    let stats = BuildStats {
        signals: netlist.signals.len(),
        cells: store.cells.len(),
        aliases: builder.aliases,
        copies: copy_count,
        registers: registers.len(),
        comb_blocks: comb_order.len(),
        clocked_blocks: clocked_order.len(),
    };
    debug!(
        signals = stats.signals,
        cells = stats.cells,
        aliases = stats.aliases,
        copies = stats.copies,
        registers = stats.registers,
        comb_blocks = stats.comb_blocks,
        clocked_blocks = stats.clocked_blocks,
        "built signal network"
    );

    Ok(Network {
        store,
        blocks,
        sensitivity,
        registers,
        comb_order,
        clocked_order,
        stats,
    })
}

fn check_signals(netlist: &Netlist) -> Result<(), SimError> {
    for (_, decl) in netlist.signals.iter() {
        if decl.width == 0 {
            return Err(WidthError::ZeroWidth.into());
        }
    }
    Ok(())
}

fn check_ref(netlist: &Netlist, r: SignalRef) -> Result<(), SimError> {
    let decl = netlist
        .signals
        .try_get(r.signal())
        .ok_or_else(|| SimError::InvalidReference {
            reason: format!("{r} is not declared in this netlist"),
        })?;
    if let SignalRef::Range { lo, hi, .. } = r {
        if lo >= hi || hi > decl.width {
            return Err(SimError::InvalidReference {
                reason: format!(
                    "range [{lo}:{hi}] is outside `{}` of width {}",
                    netlist.signal_path(r.signal()),
                    decl.width
                ),
            });
        }
    }
    Ok(())
}

fn width_of(netlist: &Netlist, signal: SignalId) -> u32 {
    netlist.signals[signal].width
}

fn ref_width(netlist: &Netlist, r: SignalRef) -> u32 {
    match r {
        SignalRef::Whole(s) => width_of(netlist, s),
        SignalRef::Range { lo, hi, .. } => hi - lo,
    }
}

/// Connection indices, deepest owning module first.
fn connection_order(netlist: &Netlist) -> Vec<usize> {
    let depth = |r: SignalRef| {
        let module = netlist.signals[r.signal()].module;
        netlist.modules.try_get(module).map_or(0, |m| m.depth)
    };
    let mut order: Vec<usize> = (0..netlist.connections.len()).collect();
    order.sort_by_key(|&i| {
        let c = netlist.connections[i];
        Reverse(depth(c.a).max(depth(c.b)))
    });
    order
}

fn subscribe(sensitivity: &mut [Vec<BlockId>], cell: CellId, block: BlockId) {
    let list = &mut sensitivity[cell.index()];
    if !list.contains(&block) {
        list.push(block);
    }
}

/// Whole-signal groups after the union pass.
struct Groups {
    /// Group index of each signal.
    of: Vec<usize>,
    /// Width of each group.
    width: Vec<u32>,
}

impl Groups {
    fn new(netlist: &Netlist) -> Self {
        let n = netlist.signals.len();
        let mut uf = UnionFind::<usize>::new(n);
        for conn in &netlist.connections {
            if let (SignalRef::Whole(a), SignalRef::Whole(b)) = (conn.a, conn.b) {
                uf.union(a.index(), b.index());
            }
        }
        let labels = uf.into_labeling();
        let mut dense = vec![usize::MAX; n];
        let mut of = Vec::with_capacity(n);
        let mut width: Vec<u32> = Vec::new();
        for (signal, label) in labels.into_iter().enumerate() {
            if dense[label] == usize::MAX {
                dense[label] = width.len();
                width.push(0);
            }
            let g = dense[label];
            let w = width_of(netlist, SignalId::from_raw(signal as u32));
            width[g] = width[g].max(w);
            of.push(g);
        }
        Self { of, width }
    }

    fn len(&self) -> usize {
        self.width.len()
    }
}

/// Tracks which groups are aliases of a sub-range of another group.
struct AliasBuilder {
    groups: Groups,
    /// `(parent group, bit offset)` for aliased groups.
    parent: Vec<Option<(usize, u32)>>,
    aliases: usize,
}

impl AliasBuilder {
    fn new(groups: Groups) -> Self {
        let parent = vec![None; groups.len()];
        Self {
            groups,
            parent,
            aliases: 0,
        }
    }

    /// Processes one connection. Returns a `(source, destination)` pair when
    /// the connection needs a copy block.
    fn connect(
        &mut self,
        netlist: &Netlist,
        a: SignalRef,
        b: SignalRef,
    ) -> Result<Option<(SignalRef, SignalRef)>, SimError> {
        let (signal, lo, hi, whole) = match (a, b) {
            (SignalRef::Whole(_), SignalRef::Whole(_)) => return Ok(None),
            (SignalRef::Range { signal, lo, hi }, SignalRef::Whole(t))
            | (SignalRef::Whole(t), SignalRef::Range { signal, lo, hi }) => (signal, lo, hi, t),
            (SignalRef::Range { .. }, SignalRef::Range { .. }) => {
                let (wa, wb) = (ref_width(netlist, a), ref_width(netlist, b));
                if wa != wb {
                    return Err(WidthError::Mismatch {
                        expected: wa,
                        found: wb,
                    }
                    .into());
                }
                return Ok(Some((a, b)));
            }
        };
        let whole_width = width_of(netlist, whole);
        if whole_width != hi - lo {
            return Err(WidthError::Mismatch {
                expected: hi - lo,
                found: whole_width,
            }
            .into());
        }
        let gs = self.groups.of[signal.index()];
        let gt = self.groups.of[whole.index()];
        let aliasable = gt != gs
            && self.parent[gt].is_none()
            && self.groups.width[gt] == hi - lo
            && !self.reaches(gs, gt);
        if aliasable {
            self.parent[gt] = Some((gs, lo));
            self.aliases += 1;
            Ok(None)
        } else {
            Ok(Some((a, b)))
        }
    }

    /// Returns `true` if following aliases from `from` arrives at `target`.
    fn reaches(&self, from: usize, target: usize) -> bool {
        let mut g = from;
        loop {
            if g == target {
                return true;
            }
            match self.parent[g] {
                Some((p, _)) => g = p,
                None => return false,
            }
        }
    }

    /// Returns the root group and bit offset for `g`.
    fn root(&self, mut g: usize) -> (usize, u32) {
        let mut offset = 0;
        while let Some((p, lo)) = self.parent[g] {
            offset += lo;
            g = p;
        }
        (g, offset)
    }

    /// Creates one cell per root group and locates every signal.
    fn materialize(&self, netlist: &Netlist) -> (Arena<CellId, Cell>, Vec<Location>) {
        let mut cells = Arena::new();
        // Only entries for root groups are read back.
        let mut cell_of = vec![CellId::from_raw(0); self.groups.len()];
        for g in 0..self.groups.len() {
            if self.parent[g].is_none() {
                cell_of[g] = cells.alloc(Cell::new(self.groups.width[g]));
            }
        }
        let locations = netlist
            .signals
            .iter()
            .map(|(signal, decl)| {
                let (root, lo) = self.root(self.groups.of[signal.index()]);
                Location {
                    cell: cell_of[root],
                    lo,
                    hi: lo + decl.width,
                }
            })
            .collect();
        (cells, locations)
    }
}

/// Writes constant values into their cells. Conflicting constants that
/// share bits are a multi-driver error.
fn seed_constants(netlist: &Netlist, store: &mut Store) -> Result<(), SimError> {
    let mut seeded: Vec<(Location, SignalId, &Bits)> = Vec::new();
    for (signal, decl) in netlist.signals.iter() {
        let SignalKind::Constant(value) = &decl.kind else {
            continue;
        };
        let loc = store.locations[signal.index()];
        for (other_loc, other, other_value) in &seeded {
            let Some((lo, hi)) = loc.overlap(other_loc) else {
                continue;
            };
            let mine = value.slice(lo - loc.lo, hi - loc.lo);
            let theirs = other_value.slice(lo - other_loc.lo, hi - other_loc.lo);
            if mine != theirs {
                warn!(
                    cell = loc.cell.as_raw(),
                    "conflicting constants share storage"
                );
                return Err(SimError::Overlap {
                    cell: loc.cell.as_raw(),
                    lo,
                    hi,
                    writers: vec![netlist.signal_path(*other), netlist.signal_path(signal)],
                });
            }
        }
        store.store(loc, value, false)?;
        seeded.push((loc, signal, value));
    }
    // Seeding happens before time zero and is not an event.
    store.take_changed();
    store.take_dirty();
    store.changes = 0;
    Ok(())
}

fn declare_registers(netlist: &Netlist, store: &mut Store) -> Result<Vec<Register>, SimError> {
    let mut registers: Vec<Register> = Vec::with_capacity(netlist.registers.len());
    for decl in &netlist.registers {
        check_ref(netlist, decl.target)?;
        let loc = store.resolve(decl.target)?;
        let name = store.describe(decl.target);
        if let Some(existing) = registers.iter().find(|r| r.loc.overlap(&loc).is_some()) {
            return Err(SimError::InvalidReference {
                reason: format!("register `{name}` overlaps register `{}`", existing.name),
            });
        }
        let reset = match &decl.reset {
            Some(value) => {
                let mut fitted = Bits::zero(loc.width());
                fitted
                    .set_slice(0, loc.width(), value)
                    .map_err(|_| WidthError::ValueTooWide {
                        value: format!("0x{value}"),
                        required: value.significant_bits(),
                        width: loc.width(),
                    })?;
                Some(fitted)
            }
            None => None,
        };
        let cell = &mut store.cells[loc.cell];
        if cell.pending.is_none() {
            cell.pending = Some(cell.current.clone());
        }
        registers.push(Register { name, loc, reset });
    }
    Ok(registers)
}

fn check_clocked_overlap(
    blocks: &Arena<BlockId, Block>,
    clocked: &[BlockId],
) -> Result<(), SimError> {
    let writes = |id: BlockId| match &blocks[id].kind {
        BlockKind::Seq { writes, .. } => writes.as_slice(),
        _ => &[],
    };
    for (i, &a) in clocked.iter().enumerate() {
        for &b in &clocked[i + 1..] {
            for wa in writes(a) {
                for wb in writes(b) {
                    if let Some((lo, hi)) = wa.overlap(wb) {
                        warn!(
                            first = %blocks[a].name,
                            second = %blocks[b].name,
                            "clocked blocks share register bits"
                        );
                        return Err(SimError::Overlap {
                            cell: wa.cell.as_raw(),
                            lo,
                            hi,
                            writers: vec![blocks[a].name.clone(), blocks[b].name.clone()],
                        });
                    }
                }
            }
        }
    }
    Ok(())
}
