//! Card table configuration for the SAPM engine.
//!
//! A card table is a TOML description of one codec's widgets, routes and
//! plain controls. This crate loads and saves those tables, validates them,
//! ships a few built-in tables, and brings a described card up on a
//! [`sapm_core::CardEngine`].
//!
//! # Features
//!
//! - **Card tables**: Load and save [`CardConfig`] from TOML files
//! - **Validation**: Catch unknown kinds, dangling routes and bad control fields
//! - **Paths**: Platform-specific card table directories
//! - **Factory cards**: Built-in tables for the Hi3516 codec and a demo card
//!
//! # Example
//!
//! ```rust
//! use sapm_config::get_factory_card;
//! use sapm_core::{Device, MemoryRegisters};
//!
//! let table = get_factory_card("hi3516-codec").unwrap();
//! let regs = MemoryRegisters::new();
//! let card = table.instantiate(Some(Device::codec(regs.clone())), None)?;
//! card.set_power_monitor(false)?;
//!
//! let report = card.control_set("Dacl enable", &[1])?;
//! assert_eq!(report.powered_up, vec!["DACL", "SPKL"]);
//! # Ok::<(), sapm_config::ConfigError>(())
//! ```

mod card;
mod error;

/// Platform-specific paths for card tables.
pub mod paths;

/// Card table validation.
pub mod validation;

/// Factory card tables bundled with the library.
pub mod factory_cards;

pub use card::{CardConfig, ComponentConfig, ControlConfig, ControlConfigKind, IdleSettings, RouteConfig};
pub use error::ConfigError;
pub use factory_cards::{FACTORY_CARD_NAMES, factory_cards, get_factory_card, is_factory_card};
pub use paths::{find_card, list_user_cards, system_cards_dir, user_cards_dir};
pub use validation::{ValidationError, ValidationResult, validate_card, validate_control};

/// Resolve a card name to a table: a file path or a user/system card file
/// first, then the built-in tables.
pub fn load_card(name: &str) -> Result<CardConfig, ConfigError> {
    if let Some(path) = find_card(name) {
        return CardConfig::load(path);
    }
    get_factory_card(name).ok_or_else(|| ConfigError::CardNotFound(name.to_string()))
}
