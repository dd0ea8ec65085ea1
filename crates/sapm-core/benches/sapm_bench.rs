//! Criterion benchmarks for the card engine (`sapm-core`).
//!
//! Measures graph build and sequencing cost on two synthetic topologies:
//!
//! - **Deep**: one DAC feeding a long chain of mixers, the first gated by a switch
//! - **Wide**: many DAC → mixer → speaker lanes sharing one enable switch
//!
//! Run with: `cargo bench -p sapm-core -- sapm/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sapm_core::{
    CardEngine, ComponentDescriptor, ComponentKind, ControlDescriptor, Device, IdleConfig,
    MemoryRegisters, MixerControl, Route,
};

const SIZES: &[usize] = &[8, 32, 128];

fn bare_card() -> CardEngine {
    CardEngine::new("bench", Some(Device::codec(MemoryRegisters::new())), None).with_idle_config(
        IdleConfig {
            enabled: false,
            ..IdleConfig::default()
        },
    )
}

// ---------------------------------------------------------------------------
// Topology constructors
// ---------------------------------------------------------------------------

/// DAC -> M0 -> M1 -> ... -> HP, with "Chain Switch" gating DAC -> M0.
fn make_deep(depth: usize) -> CardEngine {
    let card = bare_card();
    let mut descs = vec![ComponentDescriptor::new(ComponentKind::Dac, "DAC").with_register(0x00, 0)];
    for i in 0..depth {
        let mut desc = ComponentDescriptor::new(ComponentKind::Mixer, format!("M{i}"))
            .with_register(0x100 + i as u32, 0);
        if i == 0 {
            desc = desc.with_control(ControlDescriptor::mixer(
                "Chain Switch",
                MixerControl::switch(0x01, 0),
            ));
        }
        descs.push(desc);
    }
    descs.push(ComponentDescriptor::new(ComponentKind::Hp, "HP").with_register(0x02, 0));
    card.new_components(&descs).unwrap();

    let mut routes = vec![Route::gated("M0", "Chain Switch", "DAC")];
    for i in 1..depth {
        routes.push(Route::direct(format!("M{i}"), format!("M{}", i - 1)));
    }
    routes.push(Route::direct("HP", format!("M{}", depth - 1)));
    card.add_routes(&routes).unwrap();
    card.new_controls().unwrap();
    card
}

/// `lanes` independent DAC -> mixer -> speaker lanes; every mixer owns the
/// shared "Lane Enable" switch.
fn make_wide(lanes: usize) -> CardEngine {
    let card = bare_card();
    let switch = ControlDescriptor::mixer("Lane Enable", MixerControl::switch(0x01, 0));
    let mut descs = Vec::with_capacity(lanes * 3);
    let mut routes = Vec::with_capacity(lanes * 2);
    for i in 0..lanes {
        let reg = 0x100 + i as u32;
        descs.push(ComponentDescriptor::new(ComponentKind::Dac, format!("DAC{i}")).with_register(reg, 0));
        descs.push(
            ComponentDescriptor::new(ComponentKind::Mixer, format!("MIX{i}"))
                .with_register(reg, 1)
                .with_control(switch.clone()),
        );
        descs.push(ComponentDescriptor::new(ComponentKind::Speaker, format!("SPK{i}")).with_register(reg, 2));
        routes.push(Route::gated(format!("MIX{i}"), "Lane Enable", format!("DAC{i}")));
        routes.push(Route::direct(format!("SPK{i}"), format!("MIX{i}")));
    }
    card.new_components(&descs).unwrap();
    card.add_routes(&routes).unwrap();
    card.new_controls().unwrap();
    card
}

// ---------------------------------------------------------------------------
// Build benchmarks
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("sapm/build");

    for &size in SIZES {
        group.bench_with_input(BenchmarkId::new("deep", size), &size, |b, &size| {
            b.iter(|| black_box(make_deep(size)));
        });
        group.bench_with_input(BenchmarkId::new("wide", size), &size, |b, &size| {
            b.iter(|| black_box(make_wide(size)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Toggle benchmarks, one on/off cycle of the gating switch
// ---------------------------------------------------------------------------

fn bench_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sapm/toggle");

    for &size in SIZES {
        let deep = make_deep(size);
        group.bench_with_input(BenchmarkId::new("deep", size), &size, |b, _| {
            b.iter(|| {
                black_box(deep.control_set("Chain Switch", black_box(&[1])).unwrap());
                black_box(deep.control_set("Chain Switch", black_box(&[0])).unwrap());
            });
        });

        let wide = make_wide(size);
        group.bench_with_input(BenchmarkId::new("wide", size), &size, |b, _| {
            b.iter(|| {
                black_box(wide.control_set("Lane Enable", black_box(&[1])).unwrap());
                black_box(wide.control_set("Lane Enable", black_box(&[0])).unwrap());
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Connectivity benchmarks
// ---------------------------------------------------------------------------

fn bench_connectivity(c: &mut Criterion) {
    let mut group = c.benchmark_group("sapm/connectivity");

    for &size in SIZES {
        let deep = make_deep(size);
        deep.control_set("Chain Switch", &[1]).unwrap();
        group.bench_with_input(BenchmarkId::new("deep_output_count", size), &size, |b, _| {
            b.iter(|| black_box(deep.connected_output_count(black_box("DAC")).unwrap()));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_build, bench_toggle, bench_connectivity);
criterion_main!(benches);
