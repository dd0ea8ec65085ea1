//! Property-based tests for sapm-core sequencing and register access.
//!
//! Builds randomized switch-gated chains and checks that closing the chain
//! powers every stage in phase order, that opening it tears every stage down
//! in phase order, and that rejected sets never reach the bus.

use std::collections::HashMap;

use proptest::prelude::*;
use sapm_core::{
    CardEngine, ComponentDescriptor, ComponentKind, ControlDescriptor, Device, IdleConfig,
    MemoryRegisters, MixerControl, PowerState, Route, SapmError,
};

/// Intermediate stages that can own a gating switch.
const STAGES: [ComponentKind; 5] = [
    ComponentKind::Mixer,
    ComponentKind::MixerNamedCtrl,
    ComponentKind::AnalogSwitch,
    ComponentKind::Pga,
    ComponentKind::Speaker,
];

struct Chain {
    card: CardEngine,
    regs: MemoryRegisters,
    kinds: HashMap<String, ComponentKind>,
    switches: Vec<String>,
}

/// DAC -> stage0 -> stage1 -> ... -> HP. Every stage owns a switch gating
/// its input path; every component has its own power bit.
fn build_chain(stages: &[usize]) -> Chain {
    let regs = MemoryRegisters::new();
    let card = CardEngine::new("prop", Some(Device::codec(regs.clone())), None).with_idle_config(
        IdleConfig {
            enabled: false,
            ..IdleConfig::default()
        },
    );

    let mut kinds = HashMap::new();
    let mut descs = vec![ComponentDescriptor::new(ComponentKind::Dac, "DAC").with_register(0x100, 0)];
    kinds.insert("DAC".to_string(), ComponentKind::Dac);
    let mut switches = Vec::new();
    for (i, &stage) in stages.iter().enumerate() {
        let kind = STAGES[stage % STAGES.len()];
        let name = format!("S{i}");
        let switch = format!("S{i} Switch");
        descs.push(
            ComponentDescriptor::new(kind, name.clone())
                .with_register(0x101 + i as u32, 0)
                .with_control(ControlDescriptor::mixer(
                    switch.clone(),
                    MixerControl::switch(0x200 + i as u32, 0),
                )),
        );
        kinds.insert(name, kind);
        switches.push(switch);
    }
    descs.push(ComponentDescriptor::new(ComponentKind::Hp, "HP").with_register(0x1FF, 0));
    kinds.insert("HP".to_string(), ComponentKind::Hp);
    card.new_components(&descs).unwrap();

    let mut prev = "DAC".to_string();
    for (i, switch) in switches.iter().enumerate() {
        let name = format!("S{i}");
        card.add_route(&Route::gated(name.clone(), switch, prev)).unwrap();
        prev = name;
    }
    card.add_route(&Route::direct("HP", prev)).unwrap();
    card.new_controls().unwrap();

    Chain {
        card,
        regs,
        kinds,
        switches,
    }
}

fn phases(chain: &Chain, names: &[String], up: bool) -> Vec<u8> {
    names
        .iter()
        .map(|n| {
            let kind = chain.kinds[n];
            if up {
                kind.power_up_phase()
            } else {
                kind.power_down_phase()
            }
        })
        .collect()
}

/// Applies `order` as a permutation of `0..len`.
fn permuted(len: usize, order: &[usize]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..len).collect();
    for (i, &k) in order.iter().enumerate().take(len) {
        idx.swap(i, i + k % (len - i));
    }
    idx
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Closing every switch of a gated chain, in any order, powers every
    /// component, and each sequencer pass runs in non-decreasing phase order.
    #[test]
    fn closing_a_chain_powers_it_in_phase_order(
        stages in prop::collection::vec(0usize..5, 1..6),
        order in prop::collection::vec(0usize..16, 6),
    ) {
        let chain = build_chain(&stages);
        let mut powered = Vec::new();
        for i in permuted(chain.switches.len(), &order) {
            let report = chain.card.control_set(&chain.switches[i], &[1]).unwrap();
            prop_assert!(report.powered_down.is_empty());
            let up = phases(&chain, &report.powered_up, true);
            prop_assert!(up.windows(2).all(|w| w[0] <= w[1]), "out of order: {:?}", report.powered_up);
            powered.extend(report.powered_up);
        }

        prop_assert_eq!(powered.len(), chain.kinds.len());
        for name in chain.kinds.keys() {
            prop_assert_eq!(chain.card.component(name).unwrap().power, PowerState::Up);
        }
        prop_assert!(chain.card.connected_output_count("DAC").unwrap() > 0);
        prop_assert!(chain.card.connected_input_count("HP").unwrap() > 0);
    }

    /// Opening any single switch of a live chain powers everything down in
    /// non-decreasing power-down phase order. Speaker stages are left out:
    /// they terminate the output walk and would keep their upstream half up.
    #[test]
    fn opening_any_switch_tears_the_chain_down(
        stages in prop::collection::vec(0usize..4, 1..6),
        pick in 0usize..16,
    ) {
        let chain = build_chain(&stages);
        for switch in &chain.switches {
            chain.card.control_set(switch, &[1]).unwrap();
        }

        let victim = &chain.switches[pick % chain.switches.len()];
        let report = chain.card.control_set(victim, &[0]).unwrap();
        prop_assert!(report.powered_up.is_empty());
        prop_assert_eq!(report.powered_down.len(), chain.kinds.len());
        let down = phases(&chain, &report.powered_down, false);
        prop_assert!(down.windows(2).all(|w| w[0] <= w[1]), "out of order: {:?}", report.powered_down);
        for (reg, value) in chain.regs.snapshot() {
            if (0x100..0x200).contains(&reg) {
                prop_assert_eq!(value, 0, "power register {:#x} left set", reg);
            }
        }
    }

    /// A value outside the control's range is rejected before any register
    /// is read or written.
    #[test]
    fn out_of_range_set_never_touches_the_bus(
        max in 1u32..0x7F,
        excess in 1u32..0x100,
        shift in 0u32..24,
    ) {
        let regs = MemoryRegisters::new();
        let card = CardEngine::new("range", Some(Device::codec(regs.clone())), None);
        card.add_controls(&[ControlDescriptor::mixer(
            "Volume",
            MixerControl::new(0x40, shift, 0xFF, max),
        )])
        .unwrap();

        let err = card.control_set("Volume", &[max + excess]).unwrap_err();
        prop_assert!(matches!(err, SapmError::InvalidParam(_)));
        prop_assert!(regs.writes().is_empty());
        prop_assert_eq!(regs.read_count(), 0);
    }

    /// Register updates change only the addressed field.
    #[test]
    fn update_bits_preserves_neighbouring_fields(
        initial in any::<u32>(),
        shift in 0u32..24,
        width in 1u32..8,
        value in any::<u32>(),
    ) {
        let mask = (1u32 << width) - 1;
        let regs = MemoryRegisters::with_values([(0x10, initial)]);
        let dev = Device::codec(regs.clone());
        dev.update_bits(0x10, mask, shift, value, false).unwrap();

        let field = mask << shift;
        let after = regs.value(0x10);
        prop_assert_eq!(after & !field, initial & !field);
        prop_assert_eq!((after >> shift) & mask, value & mask);
    }
}
