//! Simulation error types.
//!
//! Every error represents a static modeling defect and is fatal; nothing is
//! retried internally. After a [`SimError`] is returned from a simulation
//! call, the simulator state is unspecified and the instance should be
//! dropped.

use std::io;

use strand_common::WidthError;

/// Errors that can occur while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A value does not fit its destination and truncation was not requested.
    #[error("width error: {0}")]
    Width(#[from] WidthError),

    /// Two writers drove different values onto overlapping bits of one cell.
    #[error(
        "overlapping writers on cell {cell} bits [{lo}, {hi}): {}",
        .writers.join(", ")
    )]
    Overlap {
        /// Raw index of the storage cell.
        cell: u32,
        /// Inclusive low bit of the overlap.
        lo: u32,
        /// Exclusive high bit of the overlap.
        hi: u32,
        /// Names of the conflicting writers.
        writers: Vec<String>,
    },

    /// A settle pass exceeded the activation bound without converging.
    #[error(
        "combinational loop: no fixed point after {pops} activations \
         (busiest block `{busiest}`, pending: {})",
        .pending.join(", ")
    )]
    CombinationalLoop {
        /// Activations performed before giving up.
        pops: u64,
        /// Blocks still queued when the bound was hit.
        pending: Vec<String>,
        /// The block activated most often during the failed settle.
        busiest: String,
    },

    /// A reference has no backing cell in this simulator.
    #[error("unconnected read of {signal}")]
    UnconnectedRead {
        /// Display form of the offending reference.
        signal: String,
    },

    /// A connection, register or block names a signal or range that does not exist.
    #[error("invalid reference: {reason}")]
    InvalidReference {
        /// Description of why the reference is invalid.
        reason: String,
    },

    /// A clocked block declares a write to something that is not a register.
    #[error("clocked block `{block}` writes `{signal}`, which is not a register")]
    NotARegister {
        /// The clocked block.
        block: String,
        /// The written signal.
        signal: String,
    },

    /// A clocked block wrote outside its declared write set.
    #[error("clocked block `{block}` wrote `{signal}` outside its declared write set")]
    UndeclaredWrite {
        /// The clocked block.
        block: String,
        /// The written signal.
        signal: String,
    },

    /// A test-vector output check failed.
    #[error("test vector {row}: expected {signal} = {expected}, got {actual}")]
    VectorMismatch {
        /// Zero-based row index.
        row: usize,
        /// Hierarchical name of the checked output.
        signal: String,
        /// Expected value, in hexadecimal.
        expected: String,
        /// Observed value, in hexadecimal.
        actual: String,
    },

    /// Writing waveform output failed.
    #[error("waveform I/O error: {0}")]
    Waveform(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_display() {
        let e = SimError::from(WidthError::Mismatch {
            expected: 4,
            found: 8,
        });
        assert_eq!(
            e.to_string(),
            "width error: width mismatch: expected 4 bits, found 8"
        );
    }

    #[test]
    fn overlap_display() {
        let e = SimError::Overlap {
            cell: 3,
            lo: 0,
            hi: 4,
            writers: vec!["left".into(), "right".into()],
        };
        assert_eq!(
            e.to_string(),
            "overlapping writers on cell 3 bits [0, 4): left, right"
        );
    }

    #[test]
    fn combinational_loop_display() {
        let e = SimError::CombinationalLoop {
            pops: 100,
            pending: vec!["inv".into()],
            busiest: "inv".into(),
        };
        assert_eq!(
            e.to_string(),
            "combinational loop: no fixed point after 100 activations \
             (busiest block `inv`, pending: inv)"
        );
    }

    #[test]
    fn unconnected_read_display() {
        let e = SimError::UnconnectedRead {
            signal: "signal #9".into(),
        };
        assert_eq!(e.to_string(), "unconnected read of signal #9");
    }

    #[test]
    fn invalid_reference_display() {
        let e = SimError::InvalidReference {
            reason: "empty range".into(),
        };
        assert_eq!(e.to_string(), "invalid reference: empty range");
    }

    #[test]
    fn not_a_register_display() {
        let e = SimError::NotARegister {
            block: "seq".into(),
            signal: "top.w".into(),
        };
        assert_eq!(
            e.to_string(),
            "clocked block `seq` writes `top.w`, which is not a register"
        );
    }

    #[test]
    fn undeclared_write_display() {
        let e = SimError::UndeclaredWrite {
            block: "seq".into(),
            signal: "top.r".into(),
        };
        assert!(e.to_string().contains("outside its declared write set"));
    }

    #[test]
    fn vector_mismatch_display() {
        let e = SimError::VectorMismatch {
            row: 2,
            signal: "top.out".into(),
            expected: "3".into(),
            actual: "4".into(),
        };
        assert_eq!(e.to_string(), "test vector 2: expected top.out = 3, got 4");
    }

    #[test]
    fn waveform_display() {
        let e = SimError::Waveform(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.to_string().contains("waveform I/O error"));
    }
}
