//! Value Change Dump output.
//!
//! [`VcdRecorder`] is a [`TraceHook`] that writes IEEE 1364 VCD text. Each
//! cycle `n` is dumped at time `n * period`. Signals sharing a cell get their
//! own variables, and a variable is only written when its own bits change.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use strand_common::Bits;

use crate::error::SimError;
use crate::ids::CellId;
use crate::trace::{CellChange, TraceHook, TraceSignal};

struct VcdVar {
    code: String,
    lo: u32,
    width: u32,
    last: Bits,
}

/// VCD recorder writing to any [`Write`] sink.
pub struct VcdRecorder<W: Write> {
    writer: W,
    timescale: String,
    period: u64,
    vars: Vec<VcdVar>,
    by_cell: HashMap<CellId, Vec<usize>>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder with a `1ns` timescale and 10 units per cycle.
    pub fn new(writer: W) -> Self {
        Self::with_timing(writer, "1ns", 10)
    }

    /// Creates a recorder with an explicit timescale and cycle period.
    pub fn with_timing(writer: W, timescale: &str, period: u64) -> Self {
        Self {
            writer,
            timescale: timescale.to_string(),
            period,
            vars: Vec::new(),
            by_cell: HashMap::new(),
        }
    }

    /// Returns the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the recorder, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Strand simulation")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  Strand cycle simulator")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  {}", self.timescale)?;
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    /// Generates a VCD identifier code from a sequential index.
    ///
    /// Uses the 94 printable ASCII characters starting from `!`; indices past
    /// 93 get multi-character codes.
    fn make_id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn format_value(value: &Bits) -> String {
        if value.width() == 1 {
            if value.bit(0) { "1" } else { "0" }.to_string()
        } else {
            format!("b{value:b}")
        }
    }

    fn write_value(&mut self, var: usize) -> Result<(), SimError> {
        let v = &self.vars[var];
        let text = Self::format_value(&v.last);
        if v.width == 1 {
            writeln!(self.writer, "{text}{}", v.code)?;
        } else {
            writeln!(self.writer, "{text} {}", v.code)?;
        }
        Ok(())
    }
}

impl VcdRecorder<BufWriter<File>> {
    /// Creates (or truncates) `path` and records into it.
    pub fn create(path: &Path, timescale: &str, period: u64) -> Result<Self, SimError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        Ok(Self::with_timing(BufWriter::new(file), timescale, period))
    }
}

impl<W: Write> TraceHook for VcdRecorder<W> {
    fn on_start(&mut self, signals: &[TraceSignal]) -> Result<(), SimError> {
        self.write_header()?;
        let mut open: Vec<&str> = Vec::new();
        for (i, signal) in signals.iter().enumerate() {
            let common = open
                .iter()
                .zip(&signal.scope)
                .take_while(|(a, b)| **a == b.as_str())
                .count();
            while open.len() > common {
                writeln!(self.writer, "$upscope $end")?;
                open.pop();
            }
            for name in &signal.scope[common..] {
                writeln!(self.writer, "$scope module {name} $end")?;
                open.push(name);
            }
            let code = Self::make_id_code(i);
            writeln!(
                self.writer,
                "$var wire {} {code} {} $end",
                signal.width, signal.name
            )?;
            self.by_cell.entry(signal.cell).or_default().push(i);
            self.vars.push(VcdVar {
                code,
                lo: signal.lo,
                width: signal.width,
                last: signal.initial.clone(),
            });
        }
        for _ in open {
            writeln!(self.writer, "$upscope $end")?;
        }
        writeln!(self.writer, "$enddefinitions $end")?;
        writeln!(self.writer, "#0")?;
        writeln!(self.writer, "$dumpvars")?;
        for i in 0..self.vars.len() {
            self.write_value(i)?;
        }
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    fn on_cycle(&mut self, cycle: u64, changes: &[CellChange]) -> Result<(), SimError> {
        let mut changed = Vec::new();
        for change in changes {
            let Some(vars) = self.by_cell.get(&change.cell) else {
                continue;
            };
            for &i in vars {
                let var = &mut self.vars[i];
                let value = change.value.slice(var.lo, var.lo + var.width);
                if value != var.last {
                    var.last = value;
                    changed.push(i);
                }
            }
        }
        if changed.is_empty() {
            return Ok(());
        }
        changed.sort_unstable();
        writeln!(self.writer, "#{}", cycle * self.period)?;
        for i in changed {
            self.write_value(i)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SimError> {
        self.writer.flush()?;
        Ok(())
    }
}
