use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::keys::KeyCode;
use crate::targets::{default_targets, TargetApp, TargetCatalog};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "settings";

use crate::log_warn;

pub const DISABLED_ENV: &str = "HEMINGWAY_GUARD_DISABLED";
pub const TIMEOUT_ENV: &str = "HEMINGWAY_GUARD_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardSettings {
    pub enabled: bool,
    pub trigger_keys: Vec<u16>,
    /// Snapshots with fewer words are released without validation.
    pub min_words: usize,
    pub validation_timeout_ms: u64,
    pub focus_poll_interval_ms: u64,
    /// Length limit used by the heuristic validator.
    pub max_words: usize,
    pub targets: Vec<TargetApp>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_keys: vec![KeyCode::RETURN.0, KeyCode::KEYPAD_ENTER.0],
            min_words: 3,
            validation_timeout_ms: 3_000,
            focus_poll_interval_ms: 100,
            max_words: 100,
            targets: default_targets(),
        }
    }
}

impl GuardSettings {
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms.max(1))
    }

    pub fn focus_poll_interval(&self) -> Duration {
        Duration::from_millis(self.focus_poll_interval_ms.max(1))
    }

    pub fn trigger_key_codes(&self) -> Vec<KeyCode> {
        self.trigger_keys.iter().copied().map(KeyCode).collect()
    }

    pub fn catalog(&self) -> TargetCatalog {
        TargetCatalog::new(self.targets.clone())
    }

    /// Apply `HEMINGWAY_GUARD_*` overrides through a lookup function so tests
    /// don't have to touch the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(DISABLED_ENV) {
            if value == "1" || value.eq_ignore_ascii_case("true") {
                self.enabled = false;
            }
        }

        if let Some(value) = lookup(TIMEOUT_ENV) {
            match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.validation_timeout_ms = ms,
                _ => log_warn!("ignoring {TIMEOUT_ENV}={value:?}: expected a positive integer"),
            }
        }
    }

    /// A zero timeout would expire every validation before it starts.
    fn normalize(&mut self) {
        if self.validation_timeout_ms == 0 {
            let fallback = GuardSettings::default().validation_timeout_ms;
            log_warn!("validationTimeoutMs must be positive; using {fallback}");
            self.validation_timeout_ms = fallback;
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }
}

/// Settings loaded from an optional JSON file.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<GuardSettings>,
}

impl SettingsStore {
    /// A missing file means defaults. A malformed file also means defaults,
    /// with a warning, so a typo never keeps the guard from starting.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut data = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
                serde_json::from_str(&contents).unwrap_or_else(|err| {
                    log_warn!("{} is not valid settings JSON ({err}); using defaults", path.display());
                    GuardSettings::default()
                })
            }
            _ => GuardSettings::default(),
        };
        data.normalize();
        data.apply_env_overrides();

        Ok(Self {
            path: path.map(Path::to_path_buf),
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> GuardSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.enabled = enabled;
        self.persist(&guard)
    }

    fn persist(&self, data: &GuardSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
