//! `strand run`: simulate a built-in design.
//!
//! Loads `strand.toml` (explicit `--config`, else the current directory if
//! present, else defaults), elaborates the design, resets it and runs the
//! requested number of cycles. One line per cycle shows the design's watched
//! signals. A VCD is written when `--vcd` or `waveform.path` names a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use strand_config::{ConfigError, StrandConfig, CONFIG_FILE_NAME};
use strand_sim::{SignalId, SimConfig, Simulator, VcdRecorder};
use tracing::info;

use crate::designs::{self, Design};
use crate::{GlobalArgs, RunArgs};

/// Runs the `strand run` command.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global.config.as_deref())?;
    let design = designs::find(&args.design).ok_or_else(|| {
        format!(
            "unknown design `{}` (run `strand list` to see the built-in designs)",
            args.design
        )
    })?;
    let vcd = args
        .vcd
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| config.waveform.path.clone());

    if !global.quiet {
        eprintln!("   Simulating {} for {} cycles", design.name, args.cycles);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let sim = if global.quiet {
        simulate(design, args.cycles, &config, vcd.as_deref(), &mut std::io::sink())?
    } else {
        simulate(design, args.cycles, &config, vcd.as_deref(), &mut out)?
    };

    if let Some(path) = &vcd {
        if !global.quiet {
            eprintln!("   Waveform written to {}", path.display());
        }
    }
    if args.metrics {
        if args.json {
            writeln!(out, "{}", metrics_json(&sim)?)?;
        } else {
            writeln!(out, "{}", sim.metrics().summary())?;
        }
    }
    Ok(0)
}

/// Loads the configuration for a run.
fn load_config(explicit: Option<&str>) -> Result<StrandConfig, ConfigError> {
    if let Some(path) = explicit {
        return strand_config::load_config_file(Path::new(path));
    }
    let cwd = std::env::current_dir()?;
    if cwd.join(CONFIG_FILE_NAME).is_file() {
        strand_config::load_config(&cwd)
    } else {
        Ok(StrandConfig::default())
    }
}

fn sim_config(config: &StrandConfig) -> SimConfig {
    SimConfig {
        max_settle_pops: config.sim.max_settle_pops,
        collect_metrics: config.sim.collect_metrics,
    }
}

/// Elaborates `design`, resets it and runs `cycles` clock edges, writing one
/// trace line per edge to `out`.
fn simulate(
    design: &Design,
    cycles: u64,
    config: &StrandConfig,
    vcd: Option<&Path>,
    out: &mut dyn Write,
) -> Result<Simulator, Box<dyn std::error::Error>> {
    let designs::Elaborated {
        netlist,
        watch,
        mut stimulus,
    } = design.elaborate();
    let mut sim = Simulator::new(netlist, &sim_config(config))?;
    let stats = sim.build_stats();
    info!(
        design = design.name,
        cells = stats.cells,
        aliases = stats.aliases,
        copies = stats.copies,
        "elaborated"
    );

    if let Some(path) = vcd {
        let recorder =
            VcdRecorder::create(path, &config.waveform.timescale, config.waveform.period)?;
        sim.set_trace_hook(Box::new(recorder))?;
    }

    sim.reset()?;
    writeln!(out, "{}", trace_line(&sim, &watch, "reset")?)?;
    for c in 1..=cycles {
        if let Some(drive) = stimulus.as_mut() {
            drive(&mut sim, c)?;
        }
        sim.cycle()?;
        writeln!(out, "{}", trace_line(&sim, &watch, &c.to_string())?)?;
    }
    sim.finish_trace()?;
    Ok(sim)
}

/// Formats `label: name=0x.. name=0x..` for the watched signals.
fn trace_line(
    sim: &Simulator,
    watch: &[SignalId],
    label: &str,
) -> Result<String, strand_sim::SimError> {
    let mut line = format!("{label:>5}:");
    for &s in watch {
        let path = sim.signal_path(s);
        let name = path.split_once('.').map_or(path.as_str(), |(_, rest)| rest);
        line.push_str(&format!(" {name}=0x{}", sim.read(s)?));
    }
    Ok(line)
}

fn metrics_json(sim: &Simulator) -> Result<String, serde_json::Error> {
    let metrics = sim.metrics();
    serde_json::to_string_pretty(&serde_json::json!({
        "cycles": metrics.cycles(),
        "totals": metrics.totals(),
        "history": metrics.history(),
    }))
}
