//! Connection profiles: JSON mapping of profile name -> { url, username, application }
//! Stored at $XDG_CONFIG_HOME/oemon/profiles.json (fallback ~/.config/oemon/profiles.json)
//! Passwords are never written here.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileEntry {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
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
        PathBuf::from(xdg).join("oemon")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oemon")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

pub fn load_profiles() -> ProfilesFile {
    let path = profiles_path();
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable profiles at '{}': {e}", path.display());
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

#[derive(Debug, PartialEq)]
pub enum ResolveProfile {
    /// Use the provided runtime inputs (maybe persisted by the caller).
    Direct(ProfileEntry),
    /// Loaded from an existing profile entry
    Loaded(ProfileEntry),
    /// Should prompt user to select among profile names
    PromptSelect(Vec<String>),
    /// Should prompt user to create a new profile (name)
    PromptCreate(String),
    /// No profile could be resolved (e.g., missing arguments)
    None,
}

#[derive(Debug, Default)]
pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub application: Option<String>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        match (self.url, self.profile_name) {
            // Only profile name given -> try load, letting flags override stored fields
            (None, Some(name)) => match pf.profiles.get(&name) {
                Some(entry) => ResolveProfile::Loaded(ProfileEntry {
                    url: entry.url.clone(),
                    username: self.username.unwrap_or_else(|| entry.username.clone()),
                    application: self.application.or_else(|| entry.application.clone()),
                }),
                None => ResolveProfile::PromptCreate(name),
            },
            // URL provided -> direct (maybe later saved by caller)
            (Some(url), _) => ResolveProfile::Direct(ProfileEntry {
                url,
                username: self.username.unwrap_or_default(),
                application: self.application,
            }),
            // Nothing provided -> maybe prompt select if profiles exist
            (None, None) if pf.profiles.is_empty() => ResolveProfile::None,
            (None, None) => ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(name: &str, entry: ProfileEntry) -> ProfilesFile {
        let mut pf = ProfilesFile::default();
        pf.profiles.insert(name.into(), entry);
        pf
    }

    #[test]
    fn name_only_loads_and_flags_override() {
        let pf = file_with(
            "prod",
            ProfileEntry {
                url: "https://pas:8810".into(),
                username: "tomcat".into(),
                application: Some("oepas1".into()),
            },
        );
        let req = ProfileRequest {
            profile_name: Some("prod".into()),
            username: Some("admin".into()),
            ..Default::default()
        };
        assert_eq!(
            req.resolve(&pf),
            ResolveProfile::Loaded(ProfileEntry {
                url: "https://pas:8810".into(),
                username: "admin".into(),
                application: Some("oepas1".into()),
            })
        );
    }

    #[test]
    fn unknown_name_prompts_create() {
        let req = ProfileRequest {
            profile_name: Some("dev".into()),
            ..Default::default()
        };
        assert_eq!(
            req.resolve(&ProfilesFile::default()),
            ResolveProfile::PromptCreate("dev".into())
        );
    }

    #[test]
    fn nothing_given_selects_or_gives_up() {
        assert_eq!(
            ProfileRequest::default().resolve(&ProfilesFile::default()),
            ResolveProfile::None
        );
        let pf = file_with("a", ProfileEntry::default());
        assert_eq!(
            ProfileRequest::default().resolve(&pf),
            ResolveProfile::PromptSelect(vec!["a".into()])
        );
    }

    #[test]
    fn url_is_direct() {
        let req = ProfileRequest {
            url: Some("http://h:8080".into()),
            username: Some("u".into()),
            ..Default::default()
        };
        assert_eq!(
            req.resolve(&ProfilesFile::default()),
            ResolveProfile::Direct(ProfileEntry {
                url: "http://h:8080".into(),
                username: "u".into(),
                application: None,
            })
        );
    }
}
