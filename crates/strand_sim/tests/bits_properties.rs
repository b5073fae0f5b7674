//! Value-level properties of `Bits` as seen through the simulator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strand_common::Bits;
use strand_sim::{Netlist, SimConfig, Simulator};

#[test]
fn arithmetic_stays_modulo_width() {
    let mut rng = StdRng::seed_from_u64(7);
    for width in [1u32, 3, 8, 13, 32, 63, 64] {
        let mask = if width == 64 { u64::MAX } else { (1 << width) - 1 };
        for _ in 0..50 {
            let (x, y) = (rng.gen_range(0..=mask), rng.gen_range(0..=mask));
            let a = Bits::from_u64(width, x).unwrap();
            let b = Bits::from_u64(width, y).unwrap();
            assert_eq!((&a + &b).as_u64(), x.wrapping_add(y) & mask, "w={width}");
            assert_eq!((&a - &b).as_u64(), x.wrapping_sub(y) & mask, "w={width}");
            assert_eq!((&a * &b).as_u64(), x.wrapping_mul(y) & mask, "w={width}");
            assert_eq!((!&a).as_u64(), !x & mask, "w={width}");
            assert_eq!((&a + &b).width(), width);
        }
    }
}

#[test]
fn negative_values_wrap_as_twos_complement() {
    for width in [1u32, 4, 16, 64] {
        let v = Bits::truncating(width, -1);
        assert_eq!(v, Bits::ones(width));
        assert_eq!(v.to_i64(), Some(-1));
    }
}

#[test]
fn slice_write_then_read_round_trips() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let width = rng.gen_range(1..=100u32);
        let lo = rng.gen_range(0..width);
        let hi = rng.gen_range(lo + 1..=width);
        let before = Bits::truncating(width, rng.gen::<i128>());
        let part = Bits::truncating(hi - lo, rng.gen::<i128>());

        let mut after = before.clone();
        after.set_slice(lo, hi, &part).unwrap();
        assert_eq!(after.slice(lo, hi), part);
        if lo > 0 {
            assert_eq!(after.slice(0, lo), before.slice(0, lo));
        }
        if hi < width {
            assert_eq!(after.slice(hi, width), before.slice(hi, width));
        }
    }
}

#[test]
fn slice_writes_through_the_simulator_touch_only_their_bits() {
    let mut n = Netlist::new("top");
    let bus = n.wire(n.top(), "bus", 16);
    let mut sim = Simulator::new(n, &SimConfig::default()).unwrap();

    sim.write_u64(bus, 0xFFFF).unwrap();
    sim.write_u64(bus.slice(4, 8), 0).unwrap();
    assert_eq!(sim.read_u64(bus).unwrap(), 0xFF0F);
    sim.write_u64(bus.bit(15), 0).unwrap();
    assert_eq!(sim.read_u64(bus).unwrap(), 0x7F0F);
    assert!(sim.write_u64(bus.slice(0, 2), 4).is_err());
    assert_eq!(sim.read_u64(bus).unwrap(), 0x7F0F);
}
