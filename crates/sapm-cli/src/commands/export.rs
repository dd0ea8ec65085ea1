//! Write a card table to disk.

use std::path::PathBuf;

use clap::Args;

use super::common::load_card;

#[derive(Args)]
pub struct ExportArgs {
    /// Card name or path
    card: String,

    /// Output TOML file
    output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ExportArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "'{}' already exists. Use --force to overwrite.",
            args.output.display()
        );
    }

    let card = load_card(&args.card)?;
    sapm_config::validate_card(&card)?;
    card.save(&args.output)?;
    println!("Wrote card '{}' to {}", card.name, args.output.display());
    Ok(())
}
