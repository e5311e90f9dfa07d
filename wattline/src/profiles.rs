//! Connection profiles: load/save simple JSON mapping of profile name -> { url, reconnect_delay_secs }
//! Stored under XDG config dir: $XDG_CONFIG_HOME/wattline/profiles.json (fallback ~/.config/wattline/profiles.json)

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProfileEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("wattline")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wattline")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

pub fn load_profiles() -> ProfilesFile {
    let path = profiles_path();
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable profiles file");
            ProfilesFile::default()
        }),
        Err(_) => ProfilesFile::default(),
    }
}

pub fn save_profiles(p: &ProfilesFile) -> std::io::Result<()> {
    let path = profiles_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(p)?;
    fs::write(path, data)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveProfile {
    /// Use the provided runtime inputs (not persisted).
    Direct(ProfileEntry),
    /// Loaded from existing profile entry
    Loaded(ProfileEntry),
    /// Should prompt user to select among profile names
    PromptSelect(Vec<String>),
    /// Should prompt user to create a new profile (name)
    PromptCreate(String),
    /// No profile named and no URL given; caller falls back to the default endpoint
    None,
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub url: Option<String>,
    pub reconnect_delay_secs: Option<u64>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        match (self.profile_name, self.url) {
            // Only profile name given -> try load
            (Some(name), None) => match pf.profiles.get(&name) {
                Some(entry) => {
                    let mut entry = entry.clone();
                    if self.reconnect_delay_secs.is_some() {
                        entry.reconnect_delay_secs = self.reconnect_delay_secs;
                    }
                    ResolveProfile::Loaded(entry)
                }
                None => ResolveProfile::PromptCreate(name),
            },
            // URL provided -> direct (maybe later saved by caller)
            (_, Some(url)) => ResolveProfile::Direct(ProfileEntry {
                url,
                reconnect_delay_secs: self.reconnect_delay_secs,
            }),
            // Nothing provided -> maybe prompt select if profiles exist
            (None, None) => {
                if pf.profiles.is_empty() {
                    ResolveProfile::None
                } else {
                    ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect())
                }
            }
        }
    }
}
