//! Test-vector driver.
//!
//! Each [`TestVector`] row is applied in four steps: write every input,
//! settle, compare every output that is not a don't-care, then clock once.
//! The whole run starts with a reset.

use strand_common::Bits;
use tracing::debug;

use crate::error::SimError;
use crate::kernel::Simulator;
use crate::netlist::SignalRef;

/// One row of stimulus and expected response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestVector {
    /// Values for the harness inputs, in order.
    pub inputs: Vec<u64>,
    /// Expected values for the harness outputs; `None` is a don't-care.
    pub outputs: Vec<Option<u64>>,
}

impl TestVector {
    /// Creates a row.
    pub fn new(inputs: Vec<u64>, outputs: Vec<Option<u64>>) -> Self {
        Self { inputs, outputs }
    }
}

/// Drives a [`Simulator`] through rows of [`TestVector`]s.
pub struct TestVectorSim<'a> {
    sim: &'a mut Simulator,
    inputs: Vec<SignalRef>,
    outputs: Vec<SignalRef>,
}

impl<'a> TestVectorSim<'a> {
    /// Creates a harness over the given input and output references.
    pub fn new<I, O>(sim: &'a mut Simulator, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SignalRef>,
        O: IntoIterator,
        O::Item: Into<SignalRef>,
    {
        Self {
            sim,
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    /// Resets the simulator and applies every row, stopping at the first
    /// mismatch.
    pub fn run(&mut self, vectors: &[TestVector]) -> Result<(), SimError> {
        for (row, v) in vectors.iter().enumerate() {
            if v.inputs.len() != self.inputs.len() || v.outputs.len() != self.outputs.len() {
                return Err(SimError::InvalidReference {
                    reason: format!(
                        "test vector {row} has {} inputs and {} outputs, expected {} and {}",
                        v.inputs.len(),
                        v.outputs.len(),
                        self.inputs.len(),
                        self.outputs.len()
                    ),
                });
            }
        }

        self.sim.reset()?;
        for (row, v) in vectors.iter().enumerate() {
            for (&r, &value) in self.inputs.iter().zip(&v.inputs) {
                self.sim.write_u64(r, value)?;
            }
            self.sim.eval_combinational()?;
            for (&r, expected) in self.outputs.iter().zip(&v.outputs) {
                let Some(expected) = *expected else {
                    continue;
                };
                let actual = self.sim.read(r)?;
                if !actual.value_eq(&Bits::fitting(expected)) {
                    let digits = actual.width().div_ceil(4) as usize;
                    return Err(SimError::VectorMismatch {
                        row,
                        signal: self.sim.netlist.describe(r),
                        expected: format!("0x{expected:0digits$x}"),
                        actual: format!("0x{actual}"),
                    });
                }
            }
            self.sim.cycle()?;
        }
        debug!(rows = vectors.len(), "test vectors passed");
        Ok(())
    }
}
