//! Persistent CLI settings
//!
//! Stores the default account email and server URL in ~/.tinycert/config.json.
//! Passphrase and API key are never written here; they come from flags or the
//! environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Saved defaults for the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Default account email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Default API root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

/// Reads and writes [`Settings`] at a fixed path
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at ~/.tinycert/config.json
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(Self::at(home.join(".tinycert").join("config.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or defaults when the file does not exist yet
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let json = fs::read_to_string(&self.path)
            .context(format!("Failed to read settings file: {:?}", self.path))?;

        serde_json::from_str(&json)
            .context(format!("Failed to parse settings file: {:?}", self.path))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create settings directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

        fs::write(&self.path, json)
            .context(format!("Failed to write settings file: {:?}", self.path))
    }

    pub fn set_email(&self, email: String) -> Result<()> {
        let mut settings = self.load()?;
        settings.email = Some(email);
        self.save(&settings)
    }

    pub fn set_server_url(&self, server_url: String) -> Result<()> {
        let mut settings = self.load()?;
        settings.server_url = Some(server_url);
        self.save(&settings)
    }

    /// Reset to defaults
    pub fn clear(&self) -> Result<()> {
        self.save(&Settings::default())
    }
}
