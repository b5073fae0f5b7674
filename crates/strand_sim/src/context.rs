//! Access handles passed to logic blocks.
//!
//! A [`CombContext`] reads and writes current values; every write is
//! attributed to the running block for multi-driver checking. A
//! [`SeqContext`] reads pre-edge values and stages next values for the
//! registers in the block's declared write set.

use strand_common::Bits;

use crate::error::SimError;
use crate::ids::BlockId;
use crate::netlist::SignalRef;
use crate::state::{Location, Store};

/// Handle for a combinational block.
pub struct CombContext<'a> {
    store: &'a mut Store,
    block: BlockId,
}

impl<'a> CombContext<'a> {
    pub(crate) fn new(store: &'a mut Store, block: BlockId) -> Self {
        Self { store, block }
    }

    /// Returns the current value of `r`.
    pub fn read(&self, r: impl Into<SignalRef>) -> Result<Bits, SimError> {
        let loc = self.store.resolve(r.into())?;
        Ok(self.store.load(loc))
    }

    /// Returns the low 64 bits of the current value of `r`.
    pub fn read_u64(&self, r: impl Into<SignalRef>) -> Result<u64, SimError> {
        Ok(self.read(r)?.as_u64())
    }

    /// Returns `true` if any bit of `r` is set.
    pub fn read_bool(&self, r: impl Into<SignalRef>) -> Result<bool, SimError> {
        Ok(!self.read(r)?.is_zero())
    }

    /// Writes `value` to `r`, failing if it does not fit.
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

    fn write_with(&mut self, r: SignalRef, value: &Bits, trunc: bool) -> Result<(), SimError> {
        let loc = self.store.resolve(r)?;
        self.store.store(loc, value, trunc)?;
        let written = self.store.load(loc);
        self.store.log.record(self.block, loc, written);
        Ok(())
    }
}

/// Handle for a clocked block.
pub struct SeqContext<'a> {
    store: &'a mut Store,
    name: &'a str,
    writes: &'a [Location],
}

impl<'a> SeqContext<'a> {
    pub(crate) fn new(store: &'a mut Store, name: &'a str, writes: &'a [Location]) -> Self {
        Self {
            store,
            name,
            writes,
        }
    }

    /// Returns the pre-edge value of `r`.
    pub fn read(&self, r: impl Into<SignalRef>) -> Result<Bits, SimError> {
        let loc = self.store.resolve(r.into())?;
        Ok(self.store.load(loc))
    }

    /// Returns the low 64 bits of the pre-edge value of `r`.
    pub fn read_u64(&self, r: impl Into<SignalRef>) -> Result<u64, SimError> {
        Ok(self.read(r)?.as_u64())
    }

    /// Returns `true` if any bit of `r` is set.
    pub fn read_bool(&self, r: impl Into<SignalRef>) -> Result<bool, SimError> {
        Ok(!self.read(r)?.is_zero())
    }

    /// Stages `value` as the next value of register storage `r`.
    pub fn next(&mut self, r: impl Into<SignalRef>, value: &Bits) -> Result<(), SimError> {
        self.next_with(r.into(), value, false)
    }

    /// Stages an unsigned integer as the next value of `r`.
    pub fn next_u64(&mut self, r: impl Into<SignalRef>, value: u64) -> Result<(), SimError> {
        self.next_with(r.into(), &Bits::fitting(value), false)
    }

    /// Stages the low bits of `value` as the next value of `r`.
    pub fn next_trunc(&mut self, r: impl Into<SignalRef>, value: &Bits) -> Result<(), SimError> {
        self.next_with(r.into(), value, true)
    }

    fn next_with(&mut self, r: SignalRef, value: &Bits, trunc: bool) -> Result<(), SimError> {
        let loc = self.store.resolve(r)?;
        if !self.writes.iter().any(|w| w.contains(&loc)) {
            return Err(SimError::UndeclaredWrite {
                block: self.name.to_string(),
                signal: self.store.describe(r),
            });
        }
        self.store.stage(loc, value, trunc)
    }
}
