//! Configuration types deserialized from `strand.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// Default bound on block activations in one settle pass.
pub const DEFAULT_MAX_SETTLE_POPS: u64 = 100_000;

/// The top-level configuration parsed from `strand.toml`.
///
/// Every section is optional; an empty file yields [`StrandConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrandConfig {
    /// Scheduler and bookkeeping settings.
    pub sim: SimSection,
    /// Waveform dump settings.
    pub waveform: WaveformSection,
}

/// The `[sim]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimSection {
    /// Maximum block activations in one settle before a combinational loop
    /// is reported.
    pub max_settle_pops: u64,
    /// Keep the per-cycle statistics history.
    pub collect_metrics: bool,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            max_settle_pops: DEFAULT_MAX_SETTLE_POPS,
            collect_metrics: false,
        }
    }
}

/// The `[waveform]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaveformSection {
    /// Where to write a VCD file. No file is written when absent.
    pub path: Option<PathBuf>,
    /// Time units between consecutive cycles in the dump.
    pub period: u64,
    /// The `$timescale` written in the VCD header.
    pub timescale: String,
}

impl Default for WaveformSection {
    fn default() -> Self {
        Self {
            path: None,
            period: 10,
            timescale: "1ns".to_string(),
        }
    }
}
