use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};
use uuid::Uuid;

use crate::detection::DetectorConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    /// Stable id written into every saved workout's `user_id`.
    pub owner_id: String,
    pub device: String,
    pub detector: DetectorConfig,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            owner_id: Uuid::new_v4().to_string(),
            device: std::env::consts::OS.to_string(),
            detector: DetectorConfig::default(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match parse_settings(&contents) {
                Ok(data) => data,
                Err(err) => {
                    let backup = path.with_extension("json.bak");
                    warn!(
                        "Ignoring unreadable settings at {} (copied to {}): {err:#}",
                        path.display(),
                        backup.display()
                    );
                    fs::copy(&path, &backup).with_context(|| {
                        format!("Failed to back up settings to {}", backup.display())
                    })?;
                    UserSettings::default()
                }
            }
        } else {
            UserSettings::default()
        };

        let store = Self {
            path,
            data: RwLock::new(data),
        };
        // Pins the generated owner id so later runs attribute workouts to it.
        store.persist(&store.snapshot())?;
        Ok(store)
    }

    pub fn snapshot(&self) -> UserSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn owner_id(&self) -> String {
        self.snapshot().owner_id
    }

    pub fn device(&self) -> String {
        self.snapshot().device
    }

    pub fn detector_config(&self) -> DetectorConfig {
        self.snapshot().detector
    }

    pub fn update_detector_config(&self, config: DetectorConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = guard.clone();
        updated.detector = config;
        self.persist(&updated)?;
        *guard = updated;
        Ok(())
    }

    pub fn update_device(&self, device: String) -> Result<()> {
        let device = device.trim().to_string();
        if device.is_empty() {
            bail!("device name must not be empty");
        }
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = guard.clone();
        updated.device = device;
        self.persist(&updated)?;
        *guard = updated;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data = parse_settings(&contents)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// Reads each section on its own so one bad value never costs the owner id.
/// Only text that is not a JSON object is an error.
fn parse_settings(contents: &str) -> Result<UserSettings> {
    let value: Value =
        serde_json::from_str(contents).context("settings file is not valid JSON")?;
    if !value.is_object() {
        bail!("settings file is not a JSON object");
    }

    let mut data = UserSettings::default();

    match non_empty_str(&value, "ownerId") {
        Some(owner_id) => data.owner_id = owner_id,
        None => warn!("Settings have no ownerId; generated {}", data.owner_id),
    }

    if let Some(device) = non_empty_str(&value, "device") {
        data.device = device;
    }

    if let Some(raw) = value.get("detector") {
        let detector = DetectorConfig::deserialize(raw)
            .context("detector settings have the wrong shape")
            .and_then(|config| config.validate().map(|()| config));
        match detector {
            Ok(config) => data.detector = config,
            Err(err) => warn!("Resetting detector settings to defaults: {err:#}"),
        }
    }

    Ok(data)
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
