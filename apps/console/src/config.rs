use std::{
    fs,
    path::{Path, PathBuf},
};

use conversation_core::is_valid_time_scale;
use toml::{Table, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub script_path: Option<PathBuf>,
    pub time_scale: f64,
    pub jitter_seed: Option<u64>,
    pub log_filter: String,
    pub json_events: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            script_path: None,
            time_scale: 1.0,
            jitter_seed: None,
            log_filter: "info".to_string(),
            json_events: false,
        }
    }
}

/// Settings plus the values that were dropped while loading them. Loading runs before the
/// subscriber is installed, so the caller logs these afterwards.
#[derive(Debug, Default)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub ignored: Vec<String>,
}

pub fn load_settings(path: &Path) -> LoadedSettings {
    let mut loaded = LoadedSettings::default();
    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut loaded, &raw);
    }
    apply_env(&mut loaded, |key| std::env::var(key).ok());
    loaded
}

fn apply_file(loaded: &mut LoadedSettings, raw: &str) {
    let table = match raw.parse::<Table>() {
        Ok(table) => table,
        Err(err) => {
            loaded.ignored.push(format!("settings file is not valid toml: {err}"));
            return;
        }
    };

    for (key, value) in table {
        let settings = &mut loaded.settings;
        let applied = match (key.as_str(), &value) {
            ("script_path", Value::String(path)) => {
                settings.script_path = Some(PathBuf::from(path));
                true
            }
            ("time_scale", Value::Float(scale)) => set_time_scale(settings, *scale),
            ("time_scale", Value::Integer(scale)) => set_time_scale(settings, *scale as f64),
            ("jitter_seed", Value::Integer(seed)) => match u64::try_from(*seed) {
                Ok(seed) => {
                    settings.jitter_seed = Some(seed);
                    true
                }
                Err(_) => false,
            },
            ("log_filter", Value::String(filter)) => {
                settings.log_filter = filter.clone();
                true
            }
            ("json_events", Value::Boolean(json)) => {
                settings.json_events = *json;
                true
            }
            _ => false,
        };
        if !applied {
            loaded.ignored.push(format!("{key} = {value}"));
        }
    }
}

fn apply_env(loaded: &mut LoadedSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(path) = lookup("BEACON_SCRIPT") {
        loaded.settings.script_path = Some(PathBuf::from(path));
    }
    if let Some(raw) = lookup("BEACON_TIME_SCALE") {
        let applied = raw
            .parse::<f64>()
            .is_ok_and(|scale| set_time_scale(&mut loaded.settings, scale));
        if !applied {
            loaded.ignored.push(format!("BEACON_TIME_SCALE={raw}"));
        }
    }
    if let Some(raw) = lookup("BEACON_JITTER_SEED") {
        match raw.parse::<u64>() {
            Ok(seed) => loaded.settings.jitter_seed = Some(seed),
            Err(_) => loaded.ignored.push(format!("BEACON_JITTER_SEED={raw}")),
        }
    }
    if let Some(filter) = lookup("BEACON_LOG") {
        loaded.settings.log_filter = filter;
    }
}

/// Applies `scale` if it is usable by the runtime; returns whether it was applied.
pub fn set_time_scale(settings: &mut Settings, scale: f64) -> bool {
    if is_valid_time_scale(scale) {
        settings.time_scale = scale;
        true
    } else {
        false
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
