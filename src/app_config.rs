//! Config file loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Flat `key = value` file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Primary catalog base URL.
    pub primary_endpoint: Option<String>,
    /// Backup catalog base URL.
    pub backup_endpoint: Option<String>,
    /// Render service template containing `{url}`.
    pub render_endpoint: Option<String>,
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Tracks processed at once (1..=16).
    pub concurrency: Option<u8>,
    /// Attempts per track (1..=10).
    pub max_retries: Option<u8>,
    /// Per-domain spacing in milliseconds.
    pub rate_limit: Option<u64>,
    /// `false` turns off pacing and backoff delays.
    pub polite: Option<bool>,
}

impl FileConfig {
    /// Validates config values against the CLI ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=16).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=16");
        }
        if let Some(max_retries) = self.max_retries
            && !(1..=10).contains(&max_retries)
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 1..=10");
        }
        if let Some(rate_limit) = self.rate_limit
            && rate_limit > 60_000
        {
            bail!("Invalid config value for `rate_limit`: {rate_limit}. Expected range: 0..=60000");
        }
        for (field, value) in [
            ("primary_endpoint", &self.primary_endpoint),
            ("backup_endpoint", &self.backup_endpoint),
            ("render_endpoint", &self.render_endpoint),
        ] {
            if let Some(value) = value
                && value.trim().is_empty()
            {
                bail!("Invalid config value for `{field}`: must not be empty");
            }
        }
        Ok(())
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/trackfetch/config.toml`
/// 2. `$HOME/.config/trackfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("trackfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("trackfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit `path`, or the default path when it exists.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "primary_endpoint" => {
                cfg.primary_endpoint = Some(parse_string_literal(value).with_context(context)?);
            }
            "backup_endpoint" => {
                cfg.backup_endpoint = Some(parse_string_literal(value).with_context(context)?);
            }
            "render_endpoint" => {
                cfg.render_endpoint = Some(parse_string_literal(value).with_context(context)?);
            }
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "concurrency" => {
                cfg.concurrency = Some(parse_integer_u8(value).with_context(context)?);
            }
            "max_retries" => {
                cfg.max_retries = Some(parse_integer_u8(value).with_context(context)?);
            }
            "rate_limit" => {
                cfg.rate_limit = Some(parse_integer_u64(value).with_context(context)?);
            }
            "polite" => {
                cfg.polite = Some(parse_boolean(value).with_context(context)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
