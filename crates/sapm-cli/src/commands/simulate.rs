//! Card simulation on an in-memory register map.
//!
//! Events are applied in a fixed order: register preloads before bring-up,
//! then stream events, then control sets (each in command-line order), then
//! an optional idle collapse and resume.

use std::time::{Duration, Instant};

use clap::Args;
use sapm_config::CardConfig;
use sapm_core::{CardEngine, Device, IdleOutcome, MemoryRegisters, PowerReport, StreamOp};
use serde_json::{Value, json};

use super::common::{load_card, parse_control_set, parse_key_val, parse_preload};

#[derive(Args)]
pub struct SimulateArgs {
    /// Card name or path
    card: String,

    /// Preload a codec register before bring-up (REG=VALUE, hex with 0x)
    #[arg(long = "preload", value_name = "REG=VALUE", value_parser = parse_preload)]
    preloads: Vec<(u32, u32)>,

    /// Start or stop a stream (NAME=start|stop)
    #[arg(long = "stream", value_name = "NAME=OP", value_parser = parse_key_val)]
    streams: Vec<(String, String)>,

    /// Set a control (NAME=V or NAME=LEFT,RIGHT)
    #[arg(short, long = "set", value_name = "NAME=V", value_parser = parse_control_set)]
    sets: Vec<(String, Vec<u32>)>,

    /// Let the idle timer expire twice after the sets
    #[arg(long)]
    sleep: bool,

    /// Resume after sleeping
    #[arg(long, requires = "sleep")]
    resume: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

/// A card brought up on simulated codec and accessory registers.
pub struct SimulatedCard {
    pub table: CardConfig,
    pub card: CardEngine,
    pub codec: MemoryRegisters,
    pub accessory: MemoryRegisters,
}

impl SimulatedCard {
    /// Loads `name` and brings it up with the idle timer thread off.
    pub fn bring_up(name: &str, preloads: &[(u32, u32)]) -> anyhow::Result<Self> {
        let mut table = load_card(name)?;
        table.idle.enabled = false;

        let codec = MemoryRegisters::with_values(preloads.iter().copied());
        let accessory = MemoryRegisters::new();
        let card = table.instantiate(
            Some(Device::codec(codec.clone())),
            Some(Device::accessory(accessory.clone())),
        )?;
        Ok(Self {
            table,
            card,
            codec,
            accessory,
        })
    }
}

struct Step {
    action: String,
    report: PowerReport,
}

pub fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let sim = SimulatedCard::bring_up(&args.card, &args.preloads)?;
    let card = &sim.card;
    let mut steps = Vec::new();

    for (stream, op) in &args.streams {
        let (op, label) = match op.to_ascii_lowercase().as_str() {
            "start" => (StreamOp::Start, "start"),
            "stop" => (StreamOp::Stop, "stop"),
            other => anyhow::bail!("Unknown stream operation '{}' (expected start or stop)", other),
        };
        let report = card.stream_event(stream, op)?;
        steps.push(Step {
            action: format!("stream {stream} {label}"),
            report,
        });
    }

    for (name, values) in &args.sets {
        let report = card.control_set(name, values)?;
        let shown: Vec<String> = values.iter().map(u32::to_string).collect();
        steps.push(Step {
            action: format!("set {}={}", name, shown.join(",")),
            report,
        });
    }

    if args.sleep {
        // Expiry is strictly past the threshold.
        let step = card.idle_config().sleep_threshold + Duration::from_millis(1);
        let first = Instant::now() + step;
        for (i, now) in [first, first + step].into_iter().enumerate() {
            let outcome = card.idle_tick(now);
            let (label, report) = match outcome {
                IdleOutcome::Busy => ("busy", PowerReport::default()),
                IdleOutcome::Asleep => ("asleep", PowerReport::default()),
                IdleOutcome::Armed => ("armed", PowerReport::default()),
                IdleOutcome::Standby => ("standby", PowerReport::default()),
                IdleOutcome::Slept(report) => ("slept", report),
            };
            steps.push(Step {
                action: format!("idle expiry {}: {}", i + 1, label),
                report,
            });
        }
    }

    if args.resume {
        steps.push(Step {
            action: "resume".to_string(),
            report: card.resume()?,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_report(&sim, &steps))?);
    } else {
        print_report(&sim, &steps);
    }
    Ok(())
}

fn print_report(sim: &SimulatedCard, steps: &[Step]) {
    println!("Card: {}", sim.table.name);
    println!();
    for step in steps {
        println!("{}", step.action);
        if !step.report.powered_down.is_empty() {
            println!("  down: {}", step.report.powered_down.join(", "));
        }
        if !step.report.powered_up.is_empty() {
            println!("  up:   {}", step.report.powered_up.join(", "));
        }
    }
    println!();

    let up: Vec<String> = sim
        .card
        .components()
        .into_iter()
        .filter(|c| c.power.is_up())
        .map(|c| c.name)
        .collect();
    println!("Powered: {}", if up.is_empty() { "(none)".to_string() } else { up.join(", ") });
    println!("Sleeping: {}", sim.card.is_sleeping());
    println!();

    println!("Codec registers ({} writes):", sim.codec.writes().len());
    for (reg, value) in sim.codec.snapshot() {
        println!("  {:#06x} = {:#010x}", reg, value);
    }
    let accessory = sim.accessory.snapshot();
    if !accessory.is_empty() {
        println!("Accessory registers ({} writes):", sim.accessory.writes().len());
        for (reg, value) in accessory {
            println!("  {:#06x} = {:#010x}", reg, value);
        }
    }
}

fn json_report(sim: &SimulatedCard, steps: &[Step]) -> Value {
    let registers = |regs: &MemoryRegisters| -> Value {
        regs.snapshot()
            .into_iter()
            .map(|(reg, value)| (format!("{reg:#x}"), json!(value)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    };

    json!({
        "card": sim.table.name,
        "steps": steps.iter().map(|s| json!({
            "action": s.action,
            "powered_down": s.report.powered_down,
            "powered_up": s.report.powered_up,
        })).collect::<Vec<_>>(),
        "components": sim.card.components().into_iter().map(|c| json!({
            "name": c.name,
            "kind": c.kind.to_string(),
            "power": c.power.to_string(),
            "active": c.active,
        })).collect::<Vec<_>>(),
        "sleeping": sim.card.is_sleeping(),
        "codec_registers": registers(&sim.codec),
        "codec_writes": sim.codec.writes().len(),
        "accessory_registers": registers(&sim.accessory),
    })
}
