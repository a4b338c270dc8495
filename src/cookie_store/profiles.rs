//! Browser profile discovery.
//!
//! Resolves where each browser keeps its cookie database for the current
//! user, per platform:
//! - Linux: `$XDG_CONFIG_HOME` (or `~/.config`) for Chromium browsers,
//!   `~/.mozilla/firefox` for Firefox
//! - macOS: `~/Library/Application Support`
//! - Windows: `%LOCALAPPDATA%` for Chromium browsers, `%APPDATA%` for Firefox

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::Browser;

/// Base directories browser profiles are located under.
#[derive(Debug, Clone, Default)]
pub struct ProfileRoots {
    /// User home directory.
    pub home: Option<PathBuf>,
    /// `$XDG_CONFIG_HOME`.
    pub config_home: Option<PathBuf>,
    /// `%LOCALAPPDATA%`.
    pub local_app_data: Option<PathBuf>,
    /// `%APPDATA%`.
    pub app_data: Option<PathBuf>,
}

impl ProfileRoots {
    /// Reads the roots from the process environment, ignoring empty values.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            home: sanitize_env_path(env::var_os("HOME"))
                .or_else(|| sanitize_env_path(env::var_os("USERPROFILE"))),
            config_home: sanitize_env_path(env::var_os("XDG_CONFIG_HOME")),
            local_app_data: sanitize_env_path(env::var_os("LOCALAPPDATA")),
            app_data: sanitize_env_path(env::var_os("APPDATA")),
        }
    }

    /// Existing cookie databases of a Chromium-family browser, `Default`
    /// profile first.
    #[must_use]
    pub fn chromium_cookie_databases(&self, browser: &Browser) -> Vec<PathBuf> {
        self.chromium_user_data_dir(browser)
            .map(|dir| chromium_profile_databases(&dir))
            .unwrap_or_default()
    }

    /// Existing Firefox cookie databases, default profiles first.
    #[must_use]
    pub fn firefox_cookie_databases(&self) -> Vec<PathBuf> {
        self.firefox_profiles_dir()
            .map(|dir| firefox_profile_databases(&dir))
            .unwrap_or_default()
    }

    /// User-data directory of a Chromium-family browser (parent of its
    /// profiles and of `Local State`).
    pub(crate) fn chromium_user_data_dir(&self, browser: &Browser) -> Option<PathBuf> {
        let vendor: &[&str] = if cfg!(target_os = "windows") {
            match browser {
                Browser::Chrome => &["Google", "Chrome", "User Data"],
                Browser::Edge => &["Microsoft", "Edge", "User Data"],
                Browser::Chromium => &["Chromium", "User Data"],
                Browser::Firefox | Browser::CookieFile(_) => return None,
            }
        } else if cfg!(target_os = "macos") {
            match browser {
                Browser::Chrome => &["Google", "Chrome"],
                Browser::Edge => &["Microsoft Edge"],
                Browser::Chromium => &["Chromium"],
                Browser::Firefox | Browser::CookieFile(_) => return None,
            }
        } else {
            match browser {
                Browser::Chrome => &["google-chrome"],
                Browser::Edge => &["microsoft-edge"],
                Browser::Chromium => &["chromium"],
                Browser::Firefox | Browser::CookieFile(_) => return None,
            }
        };

        let base = if cfg!(target_os = "windows") {
            self.local_app_data.clone()?
        } else if cfg!(target_os = "macos") {
            self.home.as_ref()?.join("Library").join("Application Support")
        } else {
            self.config_home
                .clone()
                .or_else(|| self.home.as_ref().map(|home| home.join(".config")))?
        };
        Some(vendor.iter().fold(base, |path, part| path.join(part)))
    }

    fn firefox_profiles_dir(&self) -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            Some(self.app_data.as_ref()?.join("Mozilla").join("Firefox").join("Profiles"))
        } else if cfg!(target_os = "macos") {
            Some(
                self.home
                    .as_ref()?
                    .join("Library")
                    .join("Application Support")
                    .join("Firefox")
                    .join("Profiles"),
            )
        } else {
            Some(self.home.as_ref()?.join(".mozilla").join("firefox"))
        }
    }
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

/// Cookie databases under a Chromium user-data directory.
///
/// Profiles are `Default` and `Profile N` (in numeric order); newer versions
/// keep the database at `<profile>/Network/Cookies`, older ones at
/// `<profile>/Cookies`.
fn chromium_profile_databases(user_data: &Path) -> Vec<PathBuf> {
    let mut profiles: Vec<(u32, String)> = subdirectory_names(user_data)
        .into_iter()
        .filter_map(|name| {
            let number = name.strip_prefix("Profile ")?.parse().ok()?;
            Some((number, name))
        })
        .collect();
    profiles.sort();
    let profiles = std::iter::once("Default".to_string())
        .chain(profiles.into_iter().map(|(_, name)| name))
        .collect::<Vec<_>>();

    profiles
        .iter()
        .filter_map(|profile| {
            let dir = user_data.join(profile);
            [dir.join("Network").join("Cookies"), dir.join("Cookies")]
                .into_iter()
                .find(|path| path.is_file())
        })
        .collect()
}

/// `cookies.sqlite` files under a Firefox profiles directory.
///
/// `*.default-release` profiles sort first, then `*.default`, then the rest
/// by name.
fn firefox_profile_databases(profiles_dir: &Path) -> Vec<PathBuf> {
    let mut profiles = subdirectory_names(profiles_dir);
    profiles.sort_by_key(|name| {
        let rank = if name.ends_with(".default-release") {
            0
        } else if name.ends_with(".default") {
            1
        } else {
            2
        };
        (rank, name.clone())
    });

    profiles
        .iter()
        .map(|profile| profiles_dir.join(profile).join("cookies.sqlite"))
        .filter(|path| path.is_file())
        .collect()
}

fn subdirectory_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect()
}
