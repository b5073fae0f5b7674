//! Structural netlist registration.
//!
//! A [`Netlist`] is the immutable input to the simulator: a tree of modules,
//! the signals they declare, point-to-point connections between whole signals
//! or bit ranges, register declarations, and logic blocks with explicit read
//! and write sets. Nothing is resolved here; [`Simulator::new`] hands the
//! netlist to the network builder.
//!
//! [`Simulator::new`]: crate::kernel::Simulator::new

use std::fmt;

use strand_common::{Arena, Bits, Ident, Interner};

use crate::context::{CombContext, SeqContext};
use crate::error::SimError;
use crate::ids::{BlockId, ModuleId, SignalId};

/// A node in the module hierarchy.
#[derive(Debug, Clone)]
pub struct ModuleDecl {
    /// Instance name, unique among siblings by convention.
    pub name: Ident,
    /// Enclosing module, `None` for the top.
    pub parent: Option<ModuleId>,
    /// Distance from the top module.
    pub depth: u32,
}

/// What a signal is declared as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// Module input port.
    InPort,
    /// Module output port.
    OutPort,
    /// Internal wire (also used for register storage).
    Wire,
    /// Constant value seeded into the signal's cell at build time.
    Constant(Bits),
}

/// A declared signal.
#[derive(Debug, Clone)]
pub struct SignalDecl {
    /// Local name within its module.
    pub name: Ident,
    /// Owning module.
    pub module: ModuleId,
    /// Width in bits.
    pub width: u32,
    /// Port, wire or constant.
    pub kind: SignalKind,
}

/// A reference to a whole signal or to a bit range `[lo, hi)` of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalRef {
    /// The entire signal.
    Whole(SignalId),
    /// Bits `[lo, hi)` of the signal.
    Range {
        /// The signal being sliced.
        signal: SignalId,
        /// Inclusive low bit.
        lo: u32,
        /// Exclusive high bit.
        hi: u32,
    },
}

impl SignalRef {
    /// Returns the referenced signal.
    pub fn signal(self) -> SignalId {
        match self {
            SignalRef::Whole(s) | SignalRef::Range { signal: s, .. } => s,
        }
    }

    /// Returns `true` for a bit-range reference.
    pub fn is_range(self) -> bool {
        matches!(self, SignalRef::Range { .. })
    }
}

impl From<SignalId> for SignalRef {
    fn from(signal: SignalId) -> Self {
        SignalRef::Whole(signal)
    }
}

impl fmt::Display for SignalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalRef::Whole(s) => write!(f, "signal #{}", s.as_raw()),
            SignalRef::Range { signal, lo, hi } => {
                write!(f, "signal #{}[{lo}:{hi}]", signal.as_raw())
            }
        }
    }
}

impl SignalId {
    /// Returns a reference to bits `[lo, hi)` of this signal.
    pub fn slice(self, lo: u32, hi: u32) -> SignalRef {
        SignalRef::Range {
            signal: self,
            lo,
            hi,
        }
    }

    /// Returns a reference to bit `index` of this signal.
    pub fn bit(self, index: u32) -> SignalRef {
        self.slice(index, index.saturating_add(1))
    }
}

/// A connection between two references, in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct Connection {
    /// First endpoint; the source when a copy block is needed.
    pub a: SignalRef,
    /// Second endpoint.
    pub b: SignalRef,
}

/// A register declaration.
#[derive(Debug, Clone)]
pub struct RegisterDecl {
    /// The storage the register occupies.
    pub target: SignalRef,
    /// Value forced by [`Simulator::reset`](crate::kernel::Simulator::reset).
    /// A register without one takes its staged next value on reset like on
    /// any other edge.
    pub reset: Option<Bits>,
}

/// Combinational logic: a pure function of current signal values.
pub trait CombLogic {
    /// Reads inputs and writes outputs through `ctx`.
    fn eval(&mut self, ctx: &mut CombContext<'_>) -> Result<(), SimError>;
}

impl<F> CombLogic for F
where
    F: FnMut(&mut CombContext<'_>) -> Result<(), SimError>,
{
    fn eval(&mut self, ctx: &mut CombContext<'_>) -> Result<(), SimError> {
        self(ctx)
    }
}

/// Clocked logic: computes next register values from pre-edge values.
pub trait SeqLogic {
    /// Reads current values and stages next values through `ctx`.
    fn tick(&mut self, ctx: &mut SeqContext<'_>) -> Result<(), SimError>;
}

impl<F> SeqLogic for F
where
    F: FnMut(&mut SeqContext<'_>) -> Result<(), SimError>,
{
    fn tick(&mut self, ctx: &mut SeqContext<'_>) -> Result<(), SimError> {
        self(ctx)
    }
}

/// The behaviour attached to a block declaration.
pub enum BlockLogic {
    /// Re-run whenever a cell in the read set changes.
    Combinational(Box<dyn CombLogic>),
    /// Run once per clock edge.
    Clocked(Box<dyn SeqLogic>),
}

impl fmt::Debug for BlockLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLogic::Combinational(_) => f.write_str("Combinational(..)"),
            BlockLogic::Clocked(_) => f.write_str("Clocked(..)"),
        }
    }
}

/// A logic block with its declared read set (combinational) or write set
/// (clocked).
#[derive(Debug)]
pub struct BlockDecl {
    /// Display name used in errors and logs.
    pub name: String,
    /// Read set for combinational blocks, write set for clocked blocks.
    pub refs: Vec<SignalRef>,
    /// The logic itself.
    pub logic: BlockLogic,
}

/// The structural description of a design.
#[derive(Debug)]
pub struct Netlist {
    pub(crate) interner: Interner,
    pub(crate) modules: Arena<ModuleId, ModuleDecl>,
    pub(crate) signals: Arena<SignalId, SignalDecl>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) registers: Vec<RegisterDecl>,
    pub(crate) blocks: Arena<BlockId, BlockDecl>,
    top: ModuleId,
}

impl Netlist {
    /// Creates a netlist whose top module is called `top`.
    pub fn new(top: &str) -> Self {
        let interner = Interner::new();
        let mut modules = Arena::new();
        let top = modules.alloc(ModuleDecl {
            name: interner.get_or_intern(top),
            parent: None,
            depth: 0,
        });
        Self {
            interner,
            modules,
            signals: Arena::new(),
            connections: Vec::new(),
            registers: Vec::new(),
            blocks: Arena::new(),
            top,
        }
    }

    /// Returns the top module.
    pub fn top(&self) -> ModuleId {
        self.top
    }

    /// Adds a submodule under `parent`.
    pub fn add_module(&mut self, parent: ModuleId, name: &str) -> ModuleId {
        let depth = self.modules.try_get(parent).map_or(0, |m| m.depth + 1);
        let name = self.interner.get_or_intern(name);
        self.modules.alloc(ModuleDecl {
            name,
            parent: Some(parent),
            depth,
        })
    }

    /// Declares an input port.
    pub fn in_port(&mut self, module: ModuleId, name: &str, width: u32) -> SignalId {
        self.declare(module, name, width, SignalKind::InPort)
    }

    /// Declares an output port.
    pub fn out_port(&mut self, module: ModuleId, name: &str, width: u32) -> SignalId {
        self.declare(module, name, width, SignalKind::OutPort)
    }

    /// Declares an internal wire.
    pub fn wire(&mut self, module: ModuleId, name: &str, width: u32) -> SignalId {
        self.declare(module, name, width, SignalKind::Wire)
    }

    /// Declares a constant whose width is the width of `value`.
    pub fn constant(&mut self, module: ModuleId, name: &str, value: Bits) -> SignalId {
        let width = value.width();
        self.declare(module, name, width, SignalKind::Constant(value))
    }

    /// Declares a wire and registers it in one step.
    pub fn reg(
        &mut self,
        module: ModuleId,
        name: &str,
        width: u32,
        reset: Option<Bits>,
    ) -> SignalId {
        let signal = self.wire(module, name, width);
        self.register(signal, reset);
        signal
    }

    /// Connects two references so they share storage.
    pub fn connect(&mut self, a: impl Into<SignalRef>, b: impl Into<SignalRef>) {
        self.connections.push(Connection {
            a: a.into(),
            b: b.into(),
        });
    }

    /// Marks `target` as register storage that persists across clock edges.
    pub fn register(&mut self, target: impl Into<SignalRef>, reset: Option<Bits>) {
        self.registers.push(RegisterDecl {
            target: target.into(),
            reset,
        });
    }

    /// Registers a combinational closure sensitive to `reads`.
    pub fn combinational<F, I, R>(&mut self, name: &str, reads: I, logic: F) -> BlockId
    where
        F: FnMut(&mut CombContext<'_>) -> Result<(), SimError> + 'static,
        I: IntoIterator<Item = R>,
        R: Into<SignalRef>,
    {
        self.add_combinational(name, reads, Box::new(logic))
    }

    /// Registers a clocked closure that may write only `writes`.
    pub fn clocked<F, I, R>(&mut self, name: &str, writes: I, logic: F) -> BlockId
    where
        F: FnMut(&mut SeqContext<'_>) -> Result<(), SimError> + 'static,
        I: IntoIterator<Item = R>,
        R: Into<SignalRef>,
    {
        self.add_clocked(name, writes, Box::new(logic))
    }

    /// Registers a boxed combinational block.
    pub fn add_combinational<I, R>(
        &mut self,
        name: &str,
        reads: I,
        logic: Box<dyn CombLogic>,
    ) -> BlockId
    where
        I: IntoIterator<Item = R>,
        R: Into<SignalRef>,
    {
        self.blocks.alloc(BlockDecl {
            name: name.to_string(),
            refs: reads.into_iter().map(Into::into).collect(),
            logic: BlockLogic::Combinational(logic),
        })
    }

    /// Registers a boxed clocked block.
    pub fn add_clocked<I, R>(&mut self, name: &str, writes: I, logic: Box<dyn SeqLogic>) -> BlockId
    where
        I: IntoIterator<Item = R>,
        R: Into<SignalRef>,
    {
        self.blocks.alloc(BlockDecl {
            name: name.to_string(),
            refs: writes.into_iter().map(Into::into).collect(),
            logic: BlockLogic::Clocked(logic),
        })
    }

    /// Returns a declared signal.
    pub fn signal(&self, id: SignalId) -> Option<&SignalDecl> {
        self.signals.try_get(id)
    }

    /// Returns the number of declared signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Returns the number of declared blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the dotted path of a module, e.g. `top.adder`.
    pub fn module_path(&self, id: ModuleId) -> String {
        self.scope(id).join(".")
    }

    /// Returns the dotted hierarchical name of a signal, e.g. `top.adder.a`.
    pub fn signal_path(&self, id: SignalId) -> String {
        match self.signals.try_get(id) {
            Some(decl) => format!(
                "{}.{}",
                self.module_path(decl.module),
                self.interner.resolve(decl.name)
            ),
            None => format!("signal #{}", id.as_raw()),
        }
    }

    /// Returns the module names from the top down to `id`.
    pub(crate) fn scope(&self, id: ModuleId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = self.modules.try_get(id).map(|_| id);
        while let Some(m) = cursor {
            let decl = &self.modules[m];
            names.push(self.interner.resolve(decl.name).to_string());
            cursor = decl.parent;
        }
        names.reverse();
        names
    }

    /// Renders a reference with hierarchical names.
    pub(crate) fn describe(&self, r: SignalRef) -> String {
        match r {
            SignalRef::Whole(s) => self.signal_path(s),
            SignalRef::Range { signal, lo, hi } if hi == lo + 1 => {
                format!("{}[{lo}]", self.signal_path(signal))
            }
            SignalRef::Range { signal, lo, hi } => {
                format!("{}[{lo}:{hi}]", self.signal_path(signal))
            }
        }
    }

    fn declare(&mut self, module: ModuleId, name: &str, width: u32, kind: SignalKind) -> SignalId {
        let name = self.interner.get_or_intern(name);
        self.signals.alloc(SignalDecl {
            name,
            module,
            width,
            kind,
        })
    }
}
