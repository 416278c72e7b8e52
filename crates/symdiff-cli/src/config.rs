//! Configuration system for symdiff
//!
//! Sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration files (.symdiff.toml, .symdiff.yaml, ...)
//! 4. Built-in defaults

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use symdiff_core::{LikeTerms, OverflowPolicy, SimplifyOptions};

/// Main symdiff configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymdiffConfig {
    /// Simplification rules
    #[serde(default)]
    pub simplify: SimplifyConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Result rendering
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimplifyConfig {
    /// Constant folding on i32 overflow (checked, wrapping, saturating)
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// Like-term combination (pairwise, extended)
    #[serde(default)]
    pub like_terms: LikeTerms,
}

impl SimplifyConfig {
    pub fn to_options(&self) -> SimplifyOptions {
        SimplifyOptions {
            overflow: self.overflow,
            like_terms: self.like_terms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Force debug logging regardless of `level`
    #[serde(default)]
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Infix rendering, one result per line
    #[default]
    Text,
    /// Expression trees and values as JSON
    Json,
}

/// Configuration loader with multiple source support
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<SymdiffConfig> {
        let mut config = Self::load_from_files()?;
        Self::apply_environment_variables(&mut config)?;
        Ok(config)
    }

    fn load_from_files() -> Result<SymdiffConfig> {
        for path in Self::find_config_files() {
            if path.is_dir() {
                info!(
                    "Ignoring config directory path (expected file): {}",
                    path.display()
                );
                continue;
            }
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(&path);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(SymdiffConfig::default())
    }

    /// Candidate configuration paths, in order of preference
    fn find_config_files() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(config_path) = env::var("SYMDIFF_CONFIG") {
            if !config_path.is_empty() {
                paths.push(PathBuf::from(config_path));
            }
        }

        let current_dir_configs = [
            ".symdiff.toml",
            ".symdiff.yaml",
            ".symdiff.yml",
            ".symdiff.json",
            "symdiff.config.toml",
            "symdiff.config.yaml",
            "symdiff.config.yml",
            "symdiff.config.json",
        ];
        if let Ok(current_dir) = env::current_dir() {
            for name in &current_dir_configs {
                paths.push(current_dir.join(name));
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            for ext in ["toml", "yaml", "yml", "json"] {
                paths.push(home_dir.join(format!(".symdiff.{ext}")));
            }
            for ext in ["toml", "yaml", "yml", "json"] {
                paths.push(home_dir.join(format!(".config/symdiff/config.{ext}")));
            }
        }

        paths
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<SymdiffConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            _ => {
                // Unknown extension: try TOML, then YAML, then JSON
                if let Ok(config) = toml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_yaml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_json::from_str(&content) {
                    config
                } else {
                    return Err(anyhow::anyhow!(
                        "Could not parse config file {} (tried TOML, YAML, JSON)",
                        path.display()
                    ));
                }
            }
        };

        Ok(config)
    }

    /// Apply environment variable overrides. Unparseable values are ignored.
    fn apply_environment_variables(config: &mut SymdiffConfig) -> Result<()> {
        if let Some(policy) = env::var("SYMDIFF_OVERFLOW")
            .ok()
            .and_then(|v| parse_overflow_policy(&v))
        {
            config.simplify.overflow = policy;
        }

        if let Some(mode) = env::var("SYMDIFF_LIKE_TERMS")
            .ok()
            .and_then(|v| parse_like_terms(&v))
        {
            config.simplify.like_terms = mode;
        }

        if let Some(level) = env::var("SYMDIFF_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::from_str(v.trim(), true).ok())
        {
            config.logging.level = level;
        }

        if let Ok(debug) = env::var("SYMDIFF_DEBUG") {
            config.logging.debug = parse_bool(&debug).unwrap_or(false);
        }

        if let Some(format) = env::var("SYMDIFF_OUTPUT")
            .ok()
            .and_then(|v| OutputFormat::from_str(v.trim(), true).ok())
        {
            config.output.format = format;
        }

        Ok(())
    }

    /// Save configuration to a file; the extension picks the format
    pub fn save_to_file(config: &SymdiffConfig, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::to_string(config).context("Failed to serialize config to YAML")?
            }
            Some("json") => serde_json::to_string_pretty(config)
                .context("Failed to serialize config to JSON")?,
            _ => toml::to_string_pretty(config).context("Failed to serialize config to TOML")?,
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Generate a sample configuration file (TOML)
    pub fn generate_sample_config() -> String {
        let config = SymdiffConfig::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| "# Failed to generate config".to_string())
    }
}

/// Parse a boolean value from string with various formats
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enable" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disable" | "disabled" => Some(false),
        "" => Some(false),
        _ => None,
    }
}

pub fn parse_overflow_policy(value: &str) -> Option<OverflowPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "checked" | "fail" => Some(OverflowPolicy::Checked),
        "wrapping" | "wrap" => Some(OverflowPolicy::Wrapping),
        "saturating" | "saturate" => Some(OverflowPolicy::Saturating),
        _ => None,
    }
}

pub fn parse_like_terms(value: &str) -> Option<LikeTerms> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pairwise" => Some(LikeTerms::Pairwise),
        "extended" => Some(LikeTerms::Extended),
        _ => None,
    }
}
