//! Factory card tables bundled with the library.
//!
//! These tables are always available without external files. `hi3516-codec`
//! describes the stream-domain widgets of the Hi3516 internal codec;
//! `demo-playback` is a small playback and capture card that uses every
//! control kind.

use crate::CardConfig;

/// Array of factory card names for external access.
pub static FACTORY_CARD_NAMES: &[&str] = &["hi3516-codec", "demo-playback"];

/// TOML content for factory cards.
static FACTORY_CARDS_TOML: &[(&str, &str)] = &[
    ("hi3516-codec", HI3516_CODEC_CARD),
    ("demo-playback", DEMO_PLAYBACK_CARD),
];

/// Hi3516 internal codec: stereo DAC into two speaker outputs, mic into two
/// capture PGAs.
const HI3516_CODEC_CARD: &str = r#"
name = "hi3516-codec"
description = "Hi3516 internal audio codec"

[idle]
poll_ms = 10000
sleep_ms = 180000

[[components]]
kind = "adc"
name = "ADCL"
reg = 0x20
shift = 15
invert = true
stream = "Capture"

[[components]]
kind = "adc"
name = "ADCR"
reg = 0x20
shift = 14
stream = "Capture"

[[components]]
kind = "dac"
name = "DACL"
reg = 0x14
shift = 11
stream = "Playback"

[[components]]
kind = "dac"
name = "DACR"
reg = 0x14
shift = 12
stream = "Playback"

[[components]]
kind = "pga"
name = "LPGA"
reg = 0x20
shift = 13

[[components.controls]]
name = "LPGA MIC Switch"
reg = 0x20
shift = 23

[[components]]
kind = "pga"
name = "RPGA"
reg = 0x20
shift = 12

[[components.controls]]
name = "RPGA MIC Switch"
reg = 0x20
shift = 31

[[components]]
kind = "spk"
name = "SPKL"

[[components.controls]]
name = "Dacl enable"
reg = 0x30
shift = 27

[[components]]
kind = "spk"
name = "SPKR"

[[components.controls]]
name = "Dacr enable"
reg = 0x30
shift = 26

[[components]]
kind = "mic"
name = "MIC"

[[routes]]
sink = "SPKL"
control = "Dacl enable"
source = "DACL"

[[routes]]
sink = "SPKR"
control = "Dacr enable"
source = "DACR"

[[routes]]
sink = "ADCL"
source = "LPGA"

[[routes]]
sink = "LPGA"
control = "LPGA MIC Switch"
source = "MIC"

[[routes]]
sink = "ADCR"
source = "RPGA"

[[routes]]
sink = "RPGA"
control = "RPGA MIC Switch"
source = "MIC"

[[controls]]
name = "Master Playback Volume"
reg = 0x2004
shift = 8
mask = 0x7F
min = 0x28
max = 0x7F

[[controls]]
name = "Master Capture Volume"
reg = 0x3c
shift = 24
mask = 0x7F
max = 0x57
invert = true

[[controls]]
name = "Playback Mute"
reg = 0x38
shift = 31

[[controls]]
name = "Capture Mute"
reg = 0x3c
shift = 31

[[controls]]
name = "Mic Left Gain"
reg = 0x20
shift = 16
mask = 0x1F
max = 0xF

[[controls]]
name = "Mic Right Gain"
reg = 0x20
shift = 24
mask = 0x1F
max = 0xF

[[controls]]
name = "External Codec Enable"
reg = 0x48
shift = 1

[[controls]]
name = "Internally Codec Enable"
reg = 0x48
shift = 0

[[controls]]
name = "Render Channel Mode"
reg = 0x2000
shift = 16
mask = 7
max = 7

[[controls]]
name = "Capture Channel Mode"
reg = 0x1000
shift = 16
mask = 7
max = 7
"#;

/// Playback through a mixer, PGA and headphone, with a mic/line bypass mux
/// and a value-mux capture selector.
const DEMO_PLAYBACK_CARD: &str = r#"
name = "demo-playback"
description = "Mixer, mux, PGA and headphone demo card"

[[components]]
kind = "dac"
name = "DAC"
reg = 0x00
shift = 0
stream = "Playback"

[[components]]
kind = "mic"
name = "MIC"

[[components]]
kind = "line"
name = "LINEIN"

[[components]]
kind = "mux"
name = "Bypass Mux"

[[components.controls]]
name = "Bypass Source"
type = "enum"
reg = 0x08
shift = 0
mask = 3
texts = ["Mic", "Line"]

[[components]]
kind = "mixer"
name = "Output Mixer"
reg = 0x00
shift = 2

[[components.controls]]
name = "DAC Playback Switch"
reg = 0x04
shift = 0

[[components.controls]]
name = "Bypass Switch"
reg = 0x04
shift = 1

[[components]]
kind = "pga"
name = "HP PGA"
reg = 0x00
shift = 3

[[components]]
kind = "hp"
name = "HP"
reg = 0x00
shift = 4

[[components]]
kind = "value_mux"
name = "ADC Mux"

[[components.controls]]
name = "Capture Source"
type = "enum"
reg = 0x0C
shift = 0
mask = 3
texts = ["Mic", "Line"]
values = [1, 2]

[[components]]
kind = "adc"
name = "ADC"
reg = 0x00
shift = 5
stream = "Capture"

[[routes]]
sink = "Bypass Mux"
control = "Mic"
source = "MIC"

[[routes]]
sink = "Bypass Mux"
control = "Line"
source = "LINEIN"

[[routes]]
sink = "Output Mixer"
control = "DAC Playback Switch"
source = "DAC"

[[routes]]
sink = "Output Mixer"
control = "Bypass Switch"
source = "Bypass Mux"

[[routes]]
sink = "HP PGA"
source = "Output Mixer"

[[routes]]
sink = "HP"
source = "HP PGA"

[[routes]]
sink = "ADC Mux"
control = "Mic"
source = "MIC"

[[routes]]
sink = "ADC Mux"
control = "Line"
source = "LINEIN"

[[routes]]
sink = "ADC"
source = "ADC Mux"

[[controls]]
name = "HP Volume"
reg = 0x10
shift = 0
rshift = 8
mask = 0x3F
max = 0x3F

[[controls]]
name = "HP Mute"
reg = 0x10
shift = 16

[[controls]]
name = "DAC Attenuation"
reg = 0x14
shift = 0
mask = 0xFF
max = 0xFF
invert = true
"#;

/// Get all factory cards.
///
/// Tables that fail to parse are skipped; the unit tests keep every bundled
/// table parseable.
pub fn factory_cards() -> Vec<CardConfig> {
    FACTORY_CARDS_TOML
        .iter()
        .filter_map(|(_, toml)| CardConfig::from_toml(toml).ok())
        .collect()
}

/// Get a factory card by name (case-insensitive).
pub fn get_factory_card(name: &str) -> Option<CardConfig> {
    let name_lower = name.to_lowercase();
    FACTORY_CARDS_TOML
        .iter()
        .find(|(card_name, _)| *card_name == name_lower)
        .and_then(|(_, toml)| CardConfig::from_toml(toml).ok())
}

/// Check if a name refers to a factory card.
pub fn is_factory_card(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    FACTORY_CARD_NAMES.contains(&name_lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_card;

    #[test]
    fn test_factory_cards_load() {
        let cards = factory_cards();
        assert_eq!(cards.len(), FACTORY_CARD_NAMES.len());
    }

    #[test]
    fn test_all_factory_cards_valid() {
        for (name, toml) in FACTORY_CARDS_TOML {
            let card = CardConfig::from_toml(toml)
                .unwrap_or_else(|e| panic!("factory card '{name}' failed to parse: {e}"));
            assert_eq!(card.name, *name);
            if let Err(e) = validate_card(&card) {
                panic!("factory card '{name}' failed validation: {e}");
            }
        }
    }

    #[test]
    fn test_get_factory_card() {
        let card = get_factory_card("HI3516-Codec").expect("hi3516-codec should exist");
        assert_eq!(card.components.len(), 9);
        assert_eq!(card.routes.len(), 6);
        assert!(get_factory_card("nonexistent").is_none());
    }

    #[test]
    fn test_is_factory_card() {
        assert!(is_factory_card("demo-playback"));
        assert!(!is_factory_card("demo"));
    }

    #[test]
    fn test_hi3516_switches_are_owned() {
        let card = get_factory_card("hi3516-codec").unwrap();
        let owned: Vec<&str> = card
            .components
            .iter()
            .flat_map(|c| c.controls.iter().map(|k| k.name.as_str()))
            .collect();
        assert_eq!(
            owned,
            ["LPGA MIC Switch", "RPGA MIC Switch", "Dacl enable", "Dacr enable"]
        );
        assert_eq!(card.controls.len(), 10);
    }
}
