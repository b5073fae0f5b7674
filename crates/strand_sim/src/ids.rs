//! Opaque ID newtypes for netlist and simulator entities.

use strand_common::define_id;

define_id!(
    /// A module in the design hierarchy.
    ModuleId
);

define_id!(
    /// A declared signal (port, wire or constant).
    SignalId
);

define_id!(
    /// A shared storage cell created by the network builder.
    CellId
);

define_id!(
    /// A combinational or clocked logic block.
    BlockId
);
