//! Built-in demonstration designs.

use strand_common::Bits;
use strand_sim::{Netlist, SignalId, SimError, Simulator};

/// Drives design inputs before clock edge `cycle` (1-based).
pub type Stimulus = Box<dyn FnMut(&mut Simulator, u64) -> Result<(), SimError>>;

/// A netlist ready to simulate, plus what to show and how to drive it.
pub struct Elaborated {
    pub netlist: Netlist,
    /// Signals printed after every cycle.
    pub watch: Vec<SignalId>,
    pub stimulus: Option<Stimulus>,
}

/// A named design constructor.
pub struct Design {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Elaborated,
}

impl Design {
    pub fn elaborate(&self) -> Elaborated {
        (self.build)()
    }
}

pub const DESIGNS: &[Design] = &[
    Design {
        name: "counter",
        description: "4-bit counter that wraps to zero",
        build: counter,
    },
    Design {
        name: "slicer",
        description: "8-bit input split into nibble outputs by aliasing",
        build: slicer,
    },
    Design {
        name: "swap",
        description: "two registers that exchange values every cycle",
        build: swap,
    },
    Design {
        name: "accumulator",
        description: "adder submodule feeding an 8-bit accumulator register",
        build: accumulator,
    },
];

pub fn find(name: &str) -> Option<&'static Design> {
    DESIGNS.iter().find(|d| d.name == name)
}

fn counter() -> Elaborated {
    let mut n = Netlist::new("counter");
    let count = n.reg(n.top(), "count", 4, Some(Bits::zero(4)));
    n.clocked("count_up", [count], move |ctx| {
        let v = ctx.read(count)?;
        ctx.next(count, &(v + 1))
    });
    Elaborated {
        netlist: n,
        watch: vec![count],
        stimulus: None,
    }
}

fn slicer() -> Elaborated {
    let mut n = Netlist::new("slicer");
    let top = n.top();
    let input = n.in_port(top, "in", 8);
    let hi = n.out_port(top, "hi", 4);
    let lo = n.out_port(top, "lo", 4);
    n.connect(input.slice(4, 8), hi);
    n.connect(input.slice(0, 4), lo);
    Elaborated {
        netlist: n,
        watch: vec![input, hi, lo],
        stimulus: Some(Box::new(move |sim: &mut Simulator, cycle: u64| {
            sim.write_trunc(input, &Bits::truncating(8, i128::from(cycle) * 37))
        })),
    }
}

fn swap() -> Elaborated {
    let mut n = Netlist::new("swap");
    let top = n.top();
    let x = n.reg(top, "x", 8, Some(Bits::truncating(8, 0x0A)));
    let y = n.reg(top, "y", 8, Some(Bits::truncating(8, 0xB0)));
    n.clocked("take_y", [x], move |ctx| {
        let v = ctx.read(y)?;
        ctx.next(x, &v)
    });
    n.clocked("take_x", [y], move |ctx| {
        let v = ctx.read(x)?;
        ctx.next(y, &v)
    });
    Elaborated {
        netlist: n,
        watch: vec![x, y],
        stimulus: None,
    }
}

fn accumulator() -> Elaborated {
    let mut n = Netlist::new("accumulator");
    let top = n.top();
    let adder = n.add_module(top, "adder");

    let a = n.in_port(adder, "a", 8);
    let b = n.in_port(adder, "b", 8);
    let sum = n.out_port(adder, "sum", 8);
    n.combinational("adder.add", [a, b], move |ctx| {
        let v = &ctx.read(a)? + &ctx.read(b)?;
        ctx.write(sum, &v)
    });

    let din = n.in_port(top, "din", 4);
    let acc = n.reg(top, "acc", 8, Some(Bits::zero(8)));
    let msb = n.out_port(top, "msb", 1);
    n.connect(a.slice(0, 4), din);
    n.connect(acc, b);
    n.connect(acc.bit(7), msb);
    n.clocked("accumulate", [acc], move |ctx| {
        let v = ctx.read(sum)?;
        ctx.next(acc, &v)
    });

    Elaborated {
        netlist: n,
        watch: vec![din, acc, msb],
        stimulus: Some(Box::new(move |sim: &mut Simulator, cycle: u64| {
            sim.write_u64(din, cycle % 16)
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_sim::SimConfig;

    fn run(name: &str, cycles: u64) -> (Simulator, Vec<SignalId>) {
        let Elaborated {
            netlist,
            watch,
            mut stimulus,
        } = find(name).unwrap().elaborate();
        let mut sim = Simulator::new(netlist, &SimConfig::default()).unwrap();
        sim.reset().unwrap();
        for c in 1..=cycles {
            if let Some(drive) = stimulus.as_mut() {
                drive(&mut sim, c).unwrap();
            }
            sim.cycle().unwrap();
        }
        (sim, watch)
    }

    #[test]
    fn names_are_unique() {
        for (i, d) in DESIGNS.iter().enumerate() {
            assert!(DESIGNS[i + 1..].iter().all(|o| o.name != d.name));
        }
        assert!(find("nope").is_none());
    }

    #[test]
    fn every_design_builds() {
        for d in DESIGNS {
            let e = d.elaborate();
            assert!(!e.watch.is_empty(), "{}", d.name);
            Simulator::new(e.netlist, &SimConfig::default()).unwrap();
        }
    }

    #[test]
    fn counter_wraps_after_sixteen() {
        let (sim, watch) = run("counter", 17);
        assert_eq!(sim.read_u64(watch[0]).unwrap(), 1);
    }

    #[test]
    fn slicer_splits_nibbles() {
        let (mut sim, watch) = run("slicer", 0);
        sim.write_u64(watch[0], 0xC5).unwrap();
        assert_eq!(sim.read_u64(watch[1]).unwrap(), 0xC);
        assert_eq!(sim.read_u64(watch[2]).unwrap(), 0x5);
    }

    #[test]
    fn swap_exchanges() {
        let (sim, watch) = run("swap", 3);
        assert_eq!(sim.read_u64(watch[0]).unwrap(), 0xB0);
        assert_eq!(sim.read_u64(watch[1]).unwrap(), 0x0A);
    }

    #[test]
    fn accumulator_sums_inputs() {
        // 1 + 2 + ... + 15 = 120, then + 0 + 1 + 2 = 123
        let (sim, watch) = run("accumulator", 18);
        assert_eq!(sim.read_u64(watch[1]).unwrap(), 123);
        assert_eq!(sim.read_u64(watch[2]).unwrap(), 0);

        let (sim, watch) = run("accumulator", 16);
        assert_eq!(sim.read_u64(watch[1]).unwrap(), 120);
    }

    #[test]
    fn accumulator_msb_aliases_top_bit() {
        let (sim, watch) = run("accumulator", 20);
        // 123 + 3 + 4 = 130
        assert_eq!(sim.read_u64(watch[1]).unwrap(), 130);
        assert_eq!(sim.read_u64(watch[2]).unwrap(), 1);
        assert_eq!(sim.build_stats().aliases, 2);
    }
}
