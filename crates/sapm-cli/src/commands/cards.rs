//! Card table listing.

use clap::Args;
use sapm_config::{CardConfig, factory_cards, list_user_cards, user_cards_dir};

#[derive(Args)]
pub struct CardsArgs {
    /// Show only factory cards
    #[arg(long)]
    factory: bool,

    /// Show only user cards
    #[arg(long)]
    user: bool,
}

pub fn run(args: CardsArgs) -> anyhow::Result<()> {
    let show_factory = !args.user;
    let show_user = !args.factory;

    if show_factory {
        println!("Factory Cards:");
        println!("==============");
        for card in factory_cards() {
            let desc = card.description.as_deref().unwrap_or("");
            println!("  {:20} - {}", card.name, desc);
        }
        println!();
    }

    if show_user {
        println!("User Cards ({}):", user_cards_dir().display());
        println!("===========");
        let user_cards = list_user_cards();
        if user_cards.is_empty() {
            println!("  (none)");
            println!();
            println!("  Start from a factory table with: sapm export hi3516-codec <path>");
        } else {
            for path in user_cards {
                let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown");
                match CardConfig::load(&path) {
                    Ok(card) => {
                        let desc = card.description.as_deref().unwrap_or("");
                        println!("  {:20} - {}", name, desc);
                    }
                    Err(_) => println!("  {:20} - (error loading)", name),
                }
            }
        }
        println!();
    }

    Ok(())
}
