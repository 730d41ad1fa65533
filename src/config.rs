use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::language::{DEFAULT_LANGUAGE, LanguageDetector, TargetLanguage, default_targets};
use crate::llm::{self, ChatSettings};
use crate::retrieval::{EXTENDED_LANGUAGES, LanguagePreferences, PREFERRED_LANGUAGES};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub default_format: Option<String>,
    /// Track precedence for the manual and generated strategies
    pub preferred_languages: Option<Vec<String>>,
    /// Track precedence for the last-resort strategy
    pub fallback_languages: Option<Vec<String>>,
    /// Detection result when no signal is conclusive
    pub default_language: Option<String>,
    /// Languages the detector recognizes, in precedence order
    pub languages: Option<Vec<TargetLanguage>>,
}

impl Config {
    /// Read the config at `config_path()`; a missing file yields the defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!("Loading config from {}", path.display());
                toml::from_str(&content).wrap_err_with(|| format!("invalid config in {}", path.display()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).wrap_err_with(|| format!("could not read {}", path.display())),
        }
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            api_url: self.api_url.clone().unwrap_or_else(|| llm::DEFAULT_API_URL.to_string()),
            api_key: self.api_key.clone(),
            model: self.model.clone().unwrap_or_else(|| llm::DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(llm::DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(llm::DEFAULT_MAX_TOKENS),
            timeout: self.timeout_secs.map(Duration::from_secs).unwrap_or(llm::DEFAULT_TIMEOUT),
        }
    }

    pub fn language_preferences(&self) -> LanguagePreferences {
        let or_default = |list: &Option<Vec<String>>, default: &[&str]| {
            list.clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
        };
        LanguagePreferences::new(
            or_default(&self.preferred_languages, PREFERRED_LANGUAGES),
            or_default(&self.fallback_languages, EXTENDED_LANGUAGES),
        )
    }

    pub fn language_detector(&self) -> LanguageDetector {
        let targets = self
            .languages
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(default_targets);
        LanguageDetector::new(targets, self.default_language.as_deref().unwrap_or(DEFAULT_LANGUAGE))
    }
}

/// `<config dir>/ytbrief/config.toml`
pub fn config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.extend(["ytbrief", "config.toml"]);
    path
}
