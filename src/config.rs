use crate::errors::Error;
use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};


pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_API_URL: &str = "https://api.genfeed.ai/v1";
pub const DEFAULT_DARKROOM_HOST: &str = "100.106.229.81";
pub const DEFAULT_DARKROOM_API_PORT: u16 = 8000;
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4";
pub const DEFAULT_VIDEO_MODEL: &str = "google-veo-3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidValue {
                field: "role".to_owned(),
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_brand: Option<String>,
    #[serde(default = "default_darkroom_host")]
    pub darkroom_host: String,
    #[serde(default = "default_darkroom_api_port")]
    pub darkroom_api_port: u16,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub defaults: GenerationDefaults,
}

// TOML file layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_profile_name")]
    pub active_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

// Default values
fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_darkroom_host() -> String {
    DEFAULT_DARKROOM_HOST.to_string()
}
fn default_darkroom_api_port() -> u16 {
    DEFAULT_DARKROOM_API_PORT
}
fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}
fn default_video_model() -> String {
    DEFAULT_VIDEO_MODEL.to_string()
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            image_model: default_image_model(),
            video_model: default_video_model(),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            active_brand: None,
            darkroom_host: default_darkroom_host(),
            darkroom_api_port: default_darkroom_api_port(),
            role: Role::default(),
            defaults: GenerationDefaults::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_profile: default_profile_name(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn darkroom_url(&self) -> String {
        format!("http://{}:{}", self.darkroom_host, self.darkroom_api_port)
    }

    /// Sets a field by its command-line name.
    pub fn set_field(&mut self, field: &str, value: &str) -> std::result::Result<(), Error> {
        match field {
            "api-url" => {
                reqwest::Url::parse(value).map_err(|_| Error::InvalidValue {
                    field: "URL".to_owned(),
                    value: value.to_owned(),
                })?;
                self.api_url = value.to_owned();
            }
            "api-key" => self.api_key = non_empty(value),
            "active-brand" => self.active_brand = non_empty(value),
            "darkroom-host" => self.darkroom_host = value.to_owned(),
            "darkroom-port" => {
                self.darkroom_api_port = value.parse().map_err(|_| Error::InvalidValue {
                    field: "port number".to_owned(),
                    value: value.to_owned(),
                })?;
            }
            "role" => self.role = value.parse()?,
            other => return Err(Error::UnknownField(other.to_owned())),
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

static CONFIG_STORE: Lazy<Arc<Mutex<HashMap<String, String>>>> =
    Lazy::new(|| Arc::new(Mutex::new(HashMap::new())));

/// Runtime override first, then a non-empty environment variable.
pub fn get(name: &str) -> Option<String> {
    if let Some(value) = get_from_store(name) {
        return Some(value);
    }
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Overrides a setting for the rest of the process, e.g. from a global flag.
pub fn set(name: &str, value: &str) {
    if let Ok(mut store) = CONFIG_STORE.lock() {
        store.insert(name.to_string(), value.to_string());
    }
}

pub fn remove(name: &str) {
    if let Ok(mut store) = CONFIG_STORE.lock() {
        store.remove(name);
    }
}

/// Sets an override and restores the previous value on drop.
#[doc(hidden)]
pub struct ConfigGuard {
    key: String,
    previous: Option<String>,
}

impl ConfigGuard {
    pub fn new(key: &str, value: &str) -> Self {
        let previous = get_from_store(key);
        set(key, value);
        Self {
            key: key.to_string(),
            previous,
        }
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(prev) => set(&self.key, prev),
            None => remove(&self.key),
        }
    }
}

fn get_from_store(name: &str) -> Option<String> {
    if let Ok(store) = CONFIG_STORE.lock() {
        store.get(name).cloned()
    } else {
        None
    }
}

/// `$GF_CONFIG`, else `$XDG_CONFIG_HOME/genfeed/config.toml`, else
/// `$HOME/.config/genfeed/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = get("GF_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let base = match get("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => get("HOME")
            .map(|home| Path::new(&home).join(".config"))
            .ok_or_else(|| anyhow!("cannot locate config directory: HOME is not set"))?,
    };
    Ok(base.join("genfeed").join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProfile {
    pub name: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
    pub name: String,
    pub active: bool,
    pub profile: Profile,
}

/// Profiles persisted in one TOML file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn open() -> Result<Self> {
        Ok(Self::at(config_path()?))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as the default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", self.path.display()))
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(config)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Profile in effect: `GF_PROFILE` or the file's active profile, with
    /// `GF_API_KEY` and `GF_API_URL` applied on top.
    pub fn active_profile(&self) -> Result<ActiveProfile> {
        let config = self.load()?;
        let name = get("GF_PROFILE").unwrap_or(config.active_profile);
        let mut profile = match config.profiles.get(&name) {
            Some(profile) => profile.clone(),
            None if name == DEFAULT_PROFILE => Profile::default(),
            None => return Err(Error::UnknownProfile(name).into()),
        };
        if let Some(api_key) = get("GF_API_KEY") {
            profile.api_key = Some(api_key);
        }
        if let Some(api_url) = get("GF_API_URL") {
            profile.api_url = api_url;
        }
        Ok(ActiveProfile { name, profile })
    }

    /// Edits the named profile, or the active one, and saves the file.
    /// Environment overrides are never written back.
    pub fn update_profile<F>(&self, name: Option<&str>, update: F) -> Result<String>
    where
        F: FnOnce(&mut Profile) -> std::result::Result<(), Error>,
    {
        let mut config = self.load()?;
        let name = match name {
            Some(name) => name.to_owned(),
            None => get("GF_PROFILE").unwrap_or_else(|| config.active_profile.clone()),
        };
        if !config.profiles.contains_key(&name) && name != DEFAULT_PROFILE {
            return Err(Error::UnknownProfile(name).into());
        }
        update(config.profiles.entry(name.clone()).or_default())?;
        self.save(&config)?;
        Ok(name)
    }

    pub fn create_profile(&self, name: &str, profile: Profile) -> Result<()> {
        let mut config = self.load()?;
        if config.profiles.contains_key(name) {
            return Err(Error::ProfileExists(name.to_owned()).into());
        }
        config.profiles.insert(name.to_owned(), profile);
        self.save(&config)
    }

    pub fn use_profile(&self, name: &str) -> Result<()> {
        let mut config = self.load()?;
        if !config.profiles.contains_key(name) && name != DEFAULT_PROFILE {
            return Err(Error::UnknownProfile(name.to_owned()).into());
        }
        config.active_profile = name.to_owned();
        self.save(&config)
    }

    /// All profiles by name; the default profile is listed even before it
    /// is first written.
    pub fn list_profiles(&self) -> Result<Vec<ProfileEntry>> {
        let mut config = self.load()?;
        config
            .profiles
            .entry(DEFAULT_PROFILE.to_owned())
            .or_default();
        let active = get("GF_PROFILE").unwrap_or(config.active_profile);
        Ok(config
            .profiles
            .into_iter()
            .map(|(name, profile)| ProfileEntry {
                active: name == active,
                name,
                profile,
            })
            .collect())
    }

    pub fn set_field(&self, field: &str, value: &str, profile: Option<&str>) -> Result<String> {
        self.update_profile(profile, |p| p.set_field(field, value))
    }

    pub fn set_api_key(&self, api_key: Option<&str>) -> Result<()> {
        self.update_profile(None, |p| {
            p.api_key = api_key.map(str::to_owned);
            Ok(())
        })?;
        Ok(())
    }

    pub fn set_active_brand(&self, brand: Option<&str>) -> Result<()> {
        self.update_profile(None, |p| {
            p.active_brand = brand.map(str::to_owned);
            Ok(())
        })?;
        Ok(())
    }
}
