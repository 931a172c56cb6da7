use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calendar::Locale;
use crate::error::{BanvicError, Result};
use crate::join::InvalidDatePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_output_dir_string")]
    pub output_dir: String,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub invalid_dates: InvalidDatePolicy,
    #[serde(default)]
    pub html: bool,
}

fn default_output_dir_string() -> String {
    default_base_dir()
        .join("processed")
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_base_dir().join("raw").to_string_lossy().to_string(),
            output_dir: default_output_dir_string(),
            locale: Locale::default(),
            invalid_dates: InvalidDatePolicy::default(),
            html: false,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("banvic")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("banvic")
        .join("dados")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| BanvicError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config").join("banvic").join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/raw".to_string(),
            output_dir: "/tmp/processed".to_string(),
            locale: Locale::En,
            invalid_dates: InvalidDatePolicy::Keep,
            html: true,
        };
        save_settings_to(&settings, &path).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.data_dir, "/tmp/raw");
        assert_eq!(loaded.output_dir, "/tmp/processed");
        assert_eq!(loaded.locale, Locale::En);
        assert_eq!(loaded.invalid_dates, InvalidDatePolicy::Keep);
        assert!(loaded.html);
    }

    #[test]
    fn test_load_missing_or_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(load_settings_from(&path).locale, Locale::PtBr);
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load_settings_from(&path).invalid_dates, InvalidDatePolicy::Drop);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.data_dir.ends_with("raw"));
        assert!(s.output_dir.ends_with("processed"));
        assert_eq!(s.locale, Locale::PtBr);
        assert_eq!(s.invalid_dates, InvalidDatePolicy::Drop);
        assert!(!s.html);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/srv/banvic"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/srv/banvic");
        assert_eq!(s.locale, Locale::PtBr);
        assert_eq!(s.invalid_dates, InvalidDatePolicy::Drop);
        assert!(s.output_dir.ends_with("processed"));
    }

    #[test]
    fn test_locale_serializes_kebab_case() {
        let json = r#"{"data_dir": "/x", "locale": "pt-br", "invalid_dates": "keep"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.locale, Locale::PtBr);
        assert_eq!(s.invalid_dates, InvalidDatePolicy::Keep);
    }

    #[test]
    fn test_shellexpand_keeps_plain_missing_path() {
        let expanded = shellexpand_path("/definitely/not/here");
        assert_eq!(expanded, "/definitely/not/here");
    }
}
