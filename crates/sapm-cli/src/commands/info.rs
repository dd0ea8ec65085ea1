//! Card inspection.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use sapm_core::{ComponentInfo, ControlType};

use super::simulate::SimulatedCard;

/// Show a card after bring-up on zeroed registers.
#[derive(Args)]
pub struct InfoArgs {
    /// Card name or path
    card: String,
}

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let sim = SimulatedCard::bring_up(&args.card, &[])?;
    let card = &sim.card;
    let table = &sim.table;

    println!("Card: {}", table.name);
    println!("{}", "=".repeat(6 + table.name.len()));
    if let Some(desc) = &table.description {
        println!("{}", desc);
    }
    println!();

    println!("Components ({}):", card.component_count());
    println!("  {:20}  {:16}  {:10}  {:10}  {}", "Name", "Kind", "Device", "Register", "Power");
    println!("  {:20}  {:16}  {:10}  {:10}  {}", "----", "----", "------", "--------", "-----");
    for comp in card.components() {
        println!(
            "  {:20}  {:16}  {:10}  {:10}  {}",
            comp.name,
            comp.kind.to_string(),
            comp.device.to_string(),
            register_label(&comp),
            comp.power
        );
    }
    println!();

    println!("Routes ({}):", card.path_count());
    for path in card.paths() {
        let via = path.name.as_deref().map(|n| format!(" [{n}]")).unwrap_or_default();
        let state = if path.connect { "connected" } else { "open" };
        println!("  {} -> {}{}  ({})", path.source, path.sink, via, state);
    }
    println!();

    let controls = card.controls();
    println!("Controls ({}):", controls.len());
    for name in controls {
        let info = card.control_info(&name)?;
        let kind = match info.control_type {
            ControlType::Boolean => "switch",
            ControlType::Integer => "integer",
            ControlType::Enumerated => "enum",
        };
        let value = card
            .control_get(&name)
            .map(|v| v.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
            .unwrap_or_else(|_| "?".to_string());
        println!(
            "  {:28}  {:8}  {}..={}  x{}  = {}",
            name, kind, info.min, info.max, info.count, value
        );
    }

    Ok(())
}

fn register_label(comp: &ComponentInfo) -> String {
    match comp.register {
        Some(reg) => {
            let inv = if reg.invert { "!" } else { "" };
            format!("{inv}{:#x}:{}", reg.reg, reg.shift)
        }
        None => "-".to_string(),
    }
}
