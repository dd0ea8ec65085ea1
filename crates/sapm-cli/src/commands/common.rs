//! Shared CLI helpers used across multiple commands.

use sapm_config::{CardConfig, load_card as config_load_card};

/// Parse a `key=value` string for clap's `value_parser`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid format: '{}' (expected key=value)", s));
    }
    Ok((parts[0].trim().to_string(), parts[1].trim().to_string()))
}

/// Parse a decimal or `0x`-prefixed hexadecimal register value.
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("Invalid number '{}': {}", s, e))
}

/// Parse `NAME=V[,V]` into a control name and its per-channel values.
pub fn parse_control_set(s: &str) -> Result<(String, Vec<u32>), String> {
    let (name, values) = parse_key_val(s)?;
    let values = values
        .split(',')
        .map(parse_u32)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((name, values))
}

/// Parse `REG=VALUE` into a register preload.
pub fn parse_preload(s: &str) -> Result<(u32, u32), String> {
    let (reg, value) = parse_key_val(s)?;
    Ok((parse_u32(&reg)?, parse_u32(&value)?))
}

/// Load a card table by name or path.
pub fn load_card(name: &str) -> anyhow::Result<CardConfig> {
    config_load_card(name).map_err(|e| {
        anyhow::anyhow!(
            "{}. Use 'sapm cards' to see available cards.",
            e
        )
    })
}
