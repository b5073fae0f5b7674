//! Trace hook and VCD output from a running simulation.

use std::cell::RefCell;
use std::rc::Rc;

use strand_common::Bits;
use strand_sim::{Netlist, SignalId, SimConfig, Simulator, TraceLog, VcdRecorder};

fn counter_with_probe() -> (Simulator, SignalId, SignalId) {
    let mut n = Netlist::new("top");
    let top = n.top();
    let probe = n.add_module(top, "probe");
    let count = n.reg(top, "count", 4, Some(Bits::zero(4)));
    let odd = n.out_port(probe, "odd", 1);
    n.clocked("count_up", [count], move |ctx| {
        let v = ctx.read(count)?;
        ctx.next(count, &(v + 1))
    });
    n.combinational("parity", [count], move |ctx| {
        let v = ctx.read(count.bit(0))?;
        ctx.write(odd, &v)
    });
    let sim = Simulator::new(n, &SimConfig::default()).unwrap();
    (sim, count, odd)
}

#[test]
fn trace_log_replays_values_per_cycle() {
    let (mut sim, count, _) = counter_with_probe();
    let log = Rc::new(RefCell::new(TraceLog::default()));
    sim.set_trace_hook(Box::new(Rc::clone(&log))).unwrap();

    sim.reset().unwrap();
    for _ in 0..3 {
        sim.cycle().unwrap();
    }
    sim.finish_trace().unwrap();
    assert_eq!(sim.read_u64(count).unwrap(), 3);

    let log = log.borrow();
    assert!(log.finished);
    let names: Vec<_> = log.signals.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["count", "odd"]);
    assert_eq!(log.signals[1].scope, vec!["top".to_string(), "probe".to_string()]);
    let cycles: Vec<u64> = log.cycles.iter().map(|(c, _)| *c).collect();
    assert_eq!(cycles, vec![1, 2, 3, 4]);
    assert_eq!(log.value_at("count", 1), Some(Bits::zero(4)));
    assert_eq!(log.value_at("count", 3), Some(Bits::new(4, 2).unwrap()));
    assert_eq!(log.value_at("odd", 4), Some(Bits::from_bool(true)));
}

#[test]
fn vcd_file_records_hierarchy_and_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.vcd");
    let (mut sim, _, _) = counter_with_probe();
    let recorder = VcdRecorder::create(&path, "1ns", 10).unwrap();
    sim.set_trace_hook(Box::new(recorder)).unwrap();

    sim.reset().unwrap();
    sim.cycle().unwrap();
    sim.cycle().unwrap();
    sim.finish_trace().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("$version\n  Strand cycle simulator\n$end"));
    assert!(text.contains(
        "$scope module top $end\n\
         $var wire 4 ! count $end\n\
         $scope module probe $end\n\
         $var wire 1 \" odd $end\n\
         $upscope $end\n\
         $upscope $end\n"
    ));
    assert!(text.contains("#20\nb0001 !\n1\"\n"));
    assert!(text.contains("#30\nb0010 !\n0\"\n"));
    assert!(!text.contains("#10\n"));
}

#[test]
fn recorder_into_memory_buffer() {
    let (mut sim, _, _) = counter_with_probe();
    let buf = Rc::new(RefCell::new(VcdRecorder::new(Vec::new())));
    sim.set_trace_hook(Box::new(Rc::clone(&buf))).unwrap();
    sim.cycle().unwrap();
    sim.finish_trace().unwrap();

    let out = String::from_utf8(buf.borrow().get_ref().clone()).unwrap();
    assert!(out.contains("$dumpvars\nb0000 !\n0\"\n$end\n"));
    assert!(out.contains("#10\nb0001 !\n1\"\n"));
}
