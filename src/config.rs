use crate::identifiers::{IdentifierSpec, OverflowPolicy, SpecError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub identifiers: IdentifiersConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeneralConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: default_log_level(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "data/logs".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BrowserConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_tab_sync_attempts")]
    pub tab_sync_attempts: u32,
    #[serde(default = "default_tab_sync_interval")]
    pub tab_sync_interval_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout(),
            tab_sync_attempts: default_tab_sync_attempts(),
            tab_sync_interval_ms: default_tab_sync_interval(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9222
}
fn default_request_timeout() -> u64 {
    5_000
}
fn default_tab_sync_attempts() -> u32 {
    10
}
fn default_tab_sync_interval() -> u64 {
    500
}

/// Whether an unreadable like count still produces an (empty) identifier pool.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingCountPolicy {
    /// Leave the pool unset.
    #[default]
    Skip,
    /// Treat the count as 0 and build an empty pool.
    Zero,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExtractionConfig {
    #[serde(default = "default_title_path")]
    pub title_path: String,
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default = "default_like_count_path")]
    pub like_count_path: String,
    /// Title shown when no tab could be read.
    #[serde(default = "default_title_fallback")]
    pub title_fallback: String,
    /// Title shown when the tab was read but held no title.
    #[serde(default = "default_title_not_found")]
    pub title_not_found: String,
    #[serde(default = "default_like_count_fallback")]
    pub like_count_fallback: String,
    #[serde(default)]
    pub missing_like_count: MissingCountPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            title_path: default_title_path(),
            image_path: default_image_path(),
            like_count_path: default_like_count_path(),
            title_fallback: default_title_fallback(),
            title_not_found: default_title_not_found(),
            like_count_fallback: default_like_count_fallback(),
            missing_like_count: MissingCountPolicy::default(),
        }
    }
}

fn default_title_path() -> String {
    "/html/body/div/div[1]/div[2]/main/article/div[2]/section[1]/div[1]/div[1]/div/h1".to_string()
}

fn default_image_path() -> String {
    "/html/body/div/div[1]/div[2]/main/article/div[1]/section/div[2]/div/div[2]/div/div[1]/div[2]/div/div[1]/div/div/div/div/figure/div[2]/picture/img".to_string()
}

fn default_like_count_path() -> String {
    "/html/body/div/div[1]/div[2]/main/article/div[2]/section[1]/section[2]/div/div/div[1]/div/div[1]/button/span".to_string()
}

fn default_title_fallback() -> String {
    "None".to_string()
}

fn default_title_not_found() -> String {
    "N/A".to_string()
}

fn default_like_count_fallback() -> String {
    "N/A".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IdentifiersConfig {
    #[serde(default = "default_adjectives")]
    pub adjectives: Vec<String>,
    #[serde(default = "default_nouns")]
    pub nouns: Vec<String>,
    #[serde(default = "default_max_number")]
    pub max_number: u32,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// Fixed seed for reproducible pools. Unset draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for IdentifiersConfig {
    fn default() -> Self {
        Self {
            adjectives: default_adjectives(),
            nouns: default_nouns(),
            max_number: default_max_number(),
            overflow: OverflowPolicy::default(),
            seed: None,
        }
    }
}

impl IdentifiersConfig {
    pub fn spec(&self) -> std::result::Result<IdentifierSpec, SpecError> {
        IdentifierSpec::new(
            self.adjectives.iter().cloned(),
            self.nouns.iter().cloned(),
            self.max_number,
        )
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn default_adjectives() -> Vec<String> {
    words(&[
        "Happy", "Brave", "Silent", "Clever", "Quick", "Fierce", "Gentle", "Curious", "Wise",
        "Sly", "Mighty", "Noble", "Charming", "Radiant", "Bold", "Daring", "Lucky", "Swift",
        "Vibrant", "Eager", "Creative", "Dynamic", "Loyal", "Playful", "Energetic", "Fearless",
        "Ambitious", "Witty", "Inventive", "Bright", "Cunning", "Graceful", "Stellar",
        "Resourceful", "Joyful", "Zealous", "Calm", "Serene",
    ])
}

fn default_nouns() -> Vec<String> {
    words(&[
        "Cat", "Dog", "Explorer", "Warrior", "Sky", "Mountain", "River", "Phoenix", "Tiger",
        "Leaf", "Star", "Wanderer", "Knight", "Shadow", "Wizard", "Dragon", "Forest", "Ocean",
        "Dreamer", "Sailor", "Hawk", "Whale", "Falcon", "Ghost", "Pathfinder", "Bard", "Nomad",
        "Guardian", "Hero", "Vortex", "Echo", "Hunter", "Sphinx", "Golem", "Sorcerer", "Raven",
        "Mermaid",
    ])
}

fn default_max_number() -> u32 {
    999
}

impl Config {
    /// Reads the config file if there is one, else falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = get_config_path();
                if config_path.exists() {
                    Self::load_from(&config_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .context(format!("Failed to read config.toml at {:?}", config_path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config.toml")?;

        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(config_path, content).context("Failed to write config.toml")?;

        Ok(())
    }
}

pub fn get_exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn get_config_path() -> PathBuf {
    let exe_dir = get_exe_dir();
    let config_path = exe_dir.join("config").join("config.toml");

    if config_path.exists() {
        return config_path;
    }

    let cwd_config = PathBuf::from("config/config.toml");
    if cwd_config.exists() {
        return cwd_config;
    }

    config_path
}
