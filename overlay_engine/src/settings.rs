use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

pub const CALL_DELAY_MINIMUM_KEY: &str = "call_delay.minimum_minutes";
pub const CALL_DELAY_MAXIMUM_KEY: &str = "call_delay.maximum_minutes";
pub const SEAT_RECONCILIATION_KEY: &str = "seat_reconciliation.enabled";
pub const CALL_DELAY_ENABLED_KEY: &str = "call_delay.enabled";
pub const ACTION_PROMOTION_KEY: &str = "action_promotion.enabled";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonPrimitive {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum SettingValue {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
}

impl From<JsonPrimitive> for SettingValue {
    fn from(value: JsonPrimitive) -> Self {
        match value {
            JsonPrimitive::String(s) => SettingValue::String(s),
            JsonPrimitive::Int(i) => SettingValue::Int(i),
            JsonPrimitive::Bool(b) => SettingValue::Bool(b),
            JsonPrimitive::Float(f) => SettingValue::Float(f),
        }
    }
}

/// Flat JSON-backed key/value store for the overlay's options. Unknown keys
/// are preserved across a save so a hand-edited file keeps its extras.
#[derive(Debug, Default, Clone)]
pub struct SettingsStore {
    values: HashMap<String, SettingValue>,
    dirty: bool,
    backing_path: Option<PathBuf>,
}

impl SettingsStore {
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let mut store = SettingsStore {
            values: HashMap::new(),
            dirty: false,
            backing_path: path.map(|p| p.to_path_buf()),
        };
        if let Some(p) = path {
            if p.exists() {
                let raw = fs::read_to_string(p)
                    .with_context(|| format!("failed to read settings file: {}", p.display()))?;
                let map: HashMap<String, JsonPrimitive> = serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse settings json: {}", p.display()))?;
                store
                    .values
                    .extend(map.into_iter().map(|(k, v)| (k, SettingValue::from(v))));
            }
        }
        Ok(store)
    }

    pub fn read_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(SettingValue::Int(i)) => Some(*i),
            Some(SettingValue::Float(f)) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn read_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(SettingValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn write_int(&mut self, key: impl Into<String>, value: i64) {
        self.write_value(key.into(), SettingValue::Int(value));
    }

    pub fn write_bool(&mut self, key: impl Into<String>, value: bool) {
        self.write_value(key.into(), SettingValue::Bool(value));
    }

    pub fn set_backing_path(&mut self, path: PathBuf) {
        self.backing_path = Some(path);
    }

    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.backing_path.as_ref() else {
            // No configured backing file; treat as successful no-op.
            self.dirty = false;
            return Ok(());
        };

        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create settings directory: {}", parent.display())
                })?;
            }
        }

        let json_value = Value::Object(self.to_json_map()?);
        let serialized = serde_json::to_string_pretty(&json_value)
            .with_context(|| format!("failed to serialize settings to JSON: {}", path.display()))?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write settings file: {}", path.display()))?;
        self.dirty = false;
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let mut snapshot = self.clone();
        snapshot.set_backing_path(path.to_path_buf());
        snapshot.save()
    }

    fn write_value(&mut self, key: String, value: SettingValue) {
        let needs_write = match self.values.get(&key) {
            Some(existing) => existing != &value,
            None => true,
        };
        if needs_write {
            self.values.insert(key, value);
            self.dirty = true;
        }
    }

    fn to_json_map(&self) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        for (key, value) in &self.values {
            map.insert(key.clone(), Self::value_to_json(value)?);
        }
        Ok(map)
    }

    fn value_to_json(value: &SettingValue) -> Result<Value> {
        match value {
            SettingValue::String(s) => Ok(Value::String(s.clone())),
            SettingValue::Int(i) => Ok(Value::Number((*i).into())),
            SettingValue::Bool(b) => Ok(Value::Bool(*b)),
            SettingValue::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| anyhow::anyhow!("unable to serialize NaN/inf float to JSON")),
        }
    }
}

/// The overlay's options, bound from a store with defaults and bounds
/// applied. The booleans gate whether each handler group is registered at
/// all; out-of-range delay bounds are clamped, never fatal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySettings {
    /// Minimum extra minutes before the side-job phone rings.
    pub call_delay_minimum_minutes: i64,
    /// Maximum extra minutes before the side-job phone rings.
    pub call_delay_maximum_minutes: i64,
    pub seat_reconciliation: bool,
    pub call_delay: bool,
    pub action_promotion: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        OverlaySettings {
            call_delay_minimum_minutes: 30,
            call_delay_maximum_minutes: 45,
            seat_reconciliation: true,
            call_delay: true,
            action_promotion: true,
        }
    }
}

impl OverlaySettings {
    /// Bind from a store, falling back to the defaults per key. Returns the
    /// bound settings plus human-readable warnings for every clamp applied.
    pub fn from_store(store: &SettingsStore) -> (Self, Vec<String>) {
        let defaults = OverlaySettings::default();
        let mut warnings = Vec::new();

        let mut minimum = store
            .read_int(CALL_DELAY_MINIMUM_KEY)
            .unwrap_or(defaults.call_delay_minimum_minutes);
        if minimum < 0 {
            warnings.push(format!(
                "{CALL_DELAY_MINIMUM_KEY} was {minimum}; clamped to 0"
            ));
            minimum = 0;
        }

        let mut maximum = store
            .read_int(CALL_DELAY_MAXIMUM_KEY)
            .unwrap_or(defaults.call_delay_maximum_minutes);
        if maximum < minimum {
            warnings.push(format!(
                "{CALL_DELAY_MAXIMUM_KEY} was {maximum}; clamped to minimum {minimum}"
            ));
            maximum = minimum;
        }

        let settings = OverlaySettings {
            call_delay_minimum_minutes: minimum,
            call_delay_maximum_minutes: maximum,
            seat_reconciliation: store
                .read_bool(SEAT_RECONCILIATION_KEY)
                .unwrap_or(defaults.seat_reconciliation),
            call_delay: store
                .read_bool(CALL_DELAY_ENABLED_KEY)
                .unwrap_or(defaults.call_delay),
            action_promotion: store
                .read_bool(ACTION_PROMOTION_KEY)
                .unwrap_or(defaults.action_promotion),
        };

        (settings, warnings)
    }

    /// Write every option at its default into the store, for the settings
    /// template the CLI can emit.
    pub fn write_defaults(store: &mut SettingsStore) {
        let defaults = OverlaySettings::default();
        store.write_int(CALL_DELAY_MINIMUM_KEY, defaults.call_delay_minimum_minutes);
        store.write_int(CALL_DELAY_MAXIMUM_KEY, defaults.call_delay_maximum_minutes);
        store.write_bool(SEAT_RECONCILIATION_KEY, defaults.seat_reconciliation);
        store.write_bool(CALL_DELAY_ENABLED_KEY, defaults.call_delay);
        store.write_bool(ACTION_PROMOTION_KEY, defaults.action_promotion);
    }
}
