//! Platform-specific paths for card tables.
//!
//! # Directory Structure
//!
//! - **User cards**: `~/.config/sapm/cards/` (Linux), `~/Library/Application Support/sapm/cards/` (macOS), `%APPDATA%\sapm\cards\` (Windows)
//! - **System cards**: `/usr/share/sapm/cards/` (Linux), `/Library/Application Support/sapm/cards/` (macOS)
//!
//! # Example
//!
//! ```rust,no_run
//! use sapm_config::paths;
//!
//! if let Some(path) = paths::find_card("hi3516-codec") {
//!     println!("Found card table at: {:?}", path);
//! }
//! ```

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "sapm";

/// Subdirectory name for card tables.
const CARDS_SUBDIR: &str = "cards";

/// Returns the user-specific card table directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_cards_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(CARDS_SUBDIR)
}

/// Returns the system-wide card table directory.
pub fn system_cards_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/share").join(APP_NAME).join(CARDS_SUBDIR)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support")
            .join(APP_NAME)
            .join(CARDS_SUBDIR)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(CARDS_SUBDIR)
    }
}

/// Find a card table file by name or path.
///
/// Searches in order: the name as a file path, then `<name>.toml` in the
/// user cards directory, then in the system cards directory.
pub fn find_card(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{}.toml", name)
    };

    [user_cards_dir(), system_cards_dir()]
        .into_iter()
        .map(|dir| dir.join(&filename))
        .find(|candidate| candidate.is_file())
}

/// Lists `.toml` files in the user cards directory.
pub fn list_user_cards() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(user_cards_dir()) else {
        return Vec::new();
    };
    let mut cards: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    cards.sort();
    cards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_cards_dir_ends_with_app_path() {
        let dir = user_cards_dir();
        assert!(dir.ends_with("sapm/cards"));
    }

    #[test]
    fn system_cards_dir_ends_with_app_path() {
        assert!(system_cards_dir().ends_with("sapm/cards"));
    }

    #[test]
    fn find_card_accepts_direct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.toml");
        std::fs::write(&path, "name = \"mine\"\n").unwrap();
        assert_eq!(find_card(path.to_str().unwrap()), Some(path));
    }

    #[test]
    fn find_card_missing() {
        assert!(find_card("no-such-card-0f3a9c").is_none());
    }
}
