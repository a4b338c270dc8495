//! Credential configuration loading.
//!
//! Configuration is read from a small `key = value` file:
//!
//! ```text
//! site = "us"
//! credentials.from = "browser"
//! credentials.browsers = ["firefox", "chrome"]
//! ```
//!
//! Non-empty `LEETCODE_SESSION`, `LEETCODE_CSRFTOKEN`, `LEETCODE_USERNAME`
//! and `LEETCODE_PASSWORD` environment variables override the file.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::client::base_uri_for_site;
use crate::cookie_store::Browser;

const APP_DIR: &str = "leetcode-auth";
const CONFIG_FILE: &str = "config.toml";

/// Strategy selectors accepted by `credentials.from`.
pub const STRATEGY_SELECTORS: [&str; 4] = ["none", "browser", "password", "cookies"];

/// Settings the credentials factory reads.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialsConfig {
    /// Strategy selector: `browser`, `password`, `cookies`, or `none`/empty.
    pub from: String,
    /// Session token for the `cookies` strategy.
    pub session: String,
    /// CSRF token for the `cookies` strategy.
    pub csrf_token: String,
    /// Account name for the `password` strategy.
    pub username: String,
    /// Account password for the `password` strategy.
    pub password: String,
    /// Browsers searched by the `browser` strategy, in priority order.
    pub browsers: Vec<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("from", &self.from)
            .field("session", &redacted(&self.session))
            .field("csrf_token", &redacted(&self.csrf_token))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("browsers", &self.browsers)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "[REDACTED]" }
}

/// File-backed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// `us`, `cn`, or an absolute base URL. Defaults to `us`.
    pub site: Option<String>,
    /// Credential strategy settings.
    pub credentials: CredentialsConfig,
}

impl FileConfig {
    /// Validates that the selected strategy has what it needs.
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing or invalid setting.
    pub fn validate(&self) -> Result<()> {
        if let Some(site) = &self.site {
            base_uri_for_site(site)
                .with_context(|| format!("Invalid config value for `site`: '{site}'"))?;
        }

        let credentials = &self.credentials;
        match credentials.from.as_str() {
            "password" => {
                if credentials.username.is_empty() || credentials.password.is_empty() {
                    bail!(
                        "`credentials.from = \"password\"` requires `credentials.username` and `credentials.password`"
                    );
                }
            }
            "cookies" => {
                if credentials.session.is_empty() || credentials.csrf_token.is_empty() {
                    bail!(
                        "`credentials.from = \"cookies\"` requires `credentials.session` and `credentials.csrf_token`"
                    );
                }
            }
            "browser" => {
                if !credentials.browsers.is_empty()
                    && Browser::parse_list(&credentials.browsers).is_empty()
                {
                    bail!(
                        "`credentials.browsers` names no supported browser: {:?} (expected chrome, edge, chromium, firefox or file:<path>)",
                        credentials.browsers
                    );
                }
            }
            "" | "none" => {}
            other => {
                tracing::warn!(
                    selector = other,
                    accepted = ?STRATEGY_SELECTORS,
                    "unknown credentials.from, requests will be sent without credentials"
                );
            }
        }
        Ok(())
    }

    /// Base URI of the configured site.
    ///
    /// # Errors
    ///
    /// Returns an error if `site` is not a known site or absolute URL.
    pub fn base_uri(&self) -> Result<String> {
        let site = self.site.as_deref().unwrap_or("us");
        base_uri_for_site(site).with_context(|| format!("Invalid config value for `site`: '{site}'"))
    }

    /// Applies the `LEETCODE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| env::var(name).ok());
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let credentials = &mut self.credentials;
        for (name, field) in [
            ("LEETCODE_SESSION", &mut credentials.session),
            ("LEETCODE_CSRFTOKEN", &mut credentials.csrf_token),
            ("LEETCODE_USERNAME", &mut credentials.username),
            ("LEETCODE_PASSWORD", &mut credentials.password),
        ] {
            if let Some(value) = lookup(name).filter(|value| !value.is_empty()) {
                *field = value;
            }
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed config, or defaults when no file exists.
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/leetcode-auth/config.toml`
/// 2. `$HOME/.config/leetcode-auth/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present, falling back to defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

/// Loads and parses the config file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains invalid settings.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config file contents.
///
/// # Errors
///
/// Returns an error naming the line of an unknown key or malformed value.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let string_value = || {
            parse_string_literal(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_number}"))
        };

        match key {
            "site" => cfg.site = Some(string_value()?),
            "credentials.from" => cfg.credentials.from = string_value()?,
            "credentials.session" => cfg.credentials.session = string_value()?,
            "credentials.csrf_token" => cfg.credentials.csrf_token = string_value()?,
            "credentials.username" => cfg.credentials.username = string_value()?,
            "credentials.password" => cfg.credentials.password = string_value()?,
            "credentials.browsers" => {
                cfg.credentials.browsers = parse_string_array(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_number}"))?;
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
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

fn parse_string_array(raw_value: &str) -> Result<Vec<String>> {
    let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        bail!("Expected array of double-quoted strings");
    };

    let inner = inner.trim().trim_end_matches(',');
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|item| parse_string_literal(item.trim()))
        .collect()
}
