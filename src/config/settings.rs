//! Controller settings
//!
//! One flat, versioned record with every field present and defaulted. Loading
//! is lenient: a malformed field falls back to its default instead of failing
//! the whole file, and the legacy `spoil_*`/`sweep_key` names are accepted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::controller::mark::DEFAULT_MARK_KEY;
use crate::controller::sequence::DEFAULT_COOLDOWN;
use crate::controller::stability::{DEFAULT_CHANGE_EPSILON, DEFAULT_STABLE_THRESHOLD};
use crate::controller::CommandList;

/// Current settings record version
pub const SETTINGS_VERSION: u32 = 1;

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Record version
    pub version: u32,
    /// Commands cycled while nothing is selected
    pub no_target_command: CommandList,
    /// Commands cycled while the target is dead
    pub dead_target_command: CommandList,
    /// Commands cycled while the target is alive and taking damage
    pub alive_target_command: CommandList,
    /// Commands sent once when the target's health plateaus
    pub far_target_command: CommandList,
    /// Minimum interval before the same command is re-sent
    pub cooldown_sec: f64,
    /// Whether the mark/finish workflow runs
    pub mark_enabled: bool,
    /// Key sent to mark a live target
    pub mark_key: Option<String>,
    /// Key sent when a marked target dies
    pub finish_key: Option<String>,
    /// Plateau duration before a live target counts as far
    pub hp_stable_threshold_sec: f64,
    /// Health delta treated as noise
    pub hp_change_epsilon: f64,
    /// Reserved; far is always a transient pulse
    pub far_transient: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            no_target_command: CommandList::new(),
            dead_target_command: CommandList::new(),
            alive_target_command: CommandList::new(),
            far_target_command: CommandList::new(),
            cooldown_sec: DEFAULT_COOLDOWN.as_secs_f64(),
            mark_enabled: true,
            mark_key: Some(DEFAULT_MARK_KEY.to_string()),
            finish_key: None,
            hp_stable_threshold_sec: DEFAULT_STABLE_THRESHOLD.as_secs_f64(),
            hp_change_epsilon: DEFAULT_CHANGE_EPSILON,
            far_transient: true,
        }
    }
}

impl Settings {
    /// Build settings from a parsed JSON document, defaulting bad fields
    pub fn from_value(raw: &Value) -> Self {
        let mut settings = Self::default();
        let Some(obj) = raw.as_object() else {
            log::warn!("Settings document is not an object, using defaults");
            return settings;
        };

        if let Some(v) = field(obj, &["no_target_command"]) {
            settings.no_target_command = command_list("no_target_command", v);
        }
        if let Some(v) = field(obj, &["dead_target_command"]) {
            settings.dead_target_command = command_list("dead_target_command", v);
        }
        if let Some(v) = field(obj, &["alive_target_command"]) {
            settings.alive_target_command = command_list("alive_target_command", v);
        }
        if let Some(v) = field(obj, &["far_target_command"]) {
            settings.far_target_command = command_list("far_target_command", v);
        }

        if let Some(secs) =
            field(obj, &["cooldown_sec"]).and_then(|v| non_negative("cooldown_sec", v))
        {
            settings.cooldown_sec = secs;
        }
        if let Some(secs) = field(obj, &["hp_stable_threshold_sec"])
            .and_then(|v| non_negative("hp_stable_threshold_sec", v))
        {
            settings.hp_stable_threshold_sec = secs;
        }
        if let Some(eps) =
            field(obj, &["hp_change_epsilon"]).and_then(|v| non_negative("hp_change_epsilon", v))
        {
            settings.hp_change_epsilon = eps;
        }

        if let Some(enabled) = field(obj, &["mark_enabled", "spoil_enabled"]).and_then(flag) {
            settings.mark_enabled = enabled;
        }
        if let Some(transient) = field(obj, &["far_transient"]).and_then(flag) {
            settings.far_transient = transient;
        }

        if let Some(key) = field(obj, &["mark_key", "spoil_key"]).and_then(key_name) {
            settings.mark_key = Some(key);
        }
        if let Some(key) = field(obj, &["finish_key", "sweep_key"]).and_then(key_name) {
            settings.finish_key = Some(key);
        }

        if let Some(version) = field(obj, &["version"]).and_then(Value::as_u64) {
            if version > u64::from(SETTINGS_VERSION) {
                log::warn!(
                    "Settings version {} is newer than {}, unknown fields ignored",
                    version,
                    SETTINGS_VERSION
                );
            }
        }

        settings
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&raw))
    }
}

/// First non-null value among the current name and its legacy aliases
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

fn command_list(name: &str, v: &Value) -> CommandList {
    match v {
        Value::String(s) => CommandList::parse_delimited(s),
        Value::Array(items) => CommandList::from_tokens(items.iter().filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })),
        other => {
            log::warn!("Ignoring malformed {}: {}", name, other);
            CommandList::new()
        }
    }
}

/// Non-negative finite number, also accepted as a numeric string
fn non_negative(name: &str, v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() && x >= 0.0 => Some(x),
        _ => {
            log::warn!("Ignoring malformed {}: {}", name, v);
            None
        }
    }
}

fn flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Blank keys fall back to the default
fn key_name(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
