//! Parsed configuration the core consumes. Loading this from TOML/YAML/CLI
//! flags is explicitly out of scope (spec §1); this module only defines the
//! shape and its defaults, mirroring spec §6's configuration map.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketInfoType {
    Tick,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(rename = "type")]
    pub market_type: MarketInfoType,
    pub microseconds: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            market_type: MarketInfoType::Bar,
            microseconds: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub microseconds: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { microseconds: 1_000_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub updown_price_limit: bool,
    pub liquidity_limit: bool,
    pub volume_limit: bool,
    pub volume_percent: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            updown_price_limit: true,
            liquidity_limit: true,
            volume_limit: true,
            volume_percent: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    RealTime,
    None,
}

impl Default for PersistMode {
    fn default() -> Self {
        PersistMode::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistConfig {
    pub mode: PersistMode,
    pub path: String,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            mode: PersistMode::None,
            path: "data/persist".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub path: String,
    pub level: String,
    pub console_print: bool,
    pub keep_history: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: "logs".into(),
            level: "info".into(),
            console_print: true,
            keep_history: 7,
        }
    }
}

/// Per-module toggle block (`mod.<name>` in spec §6). `extra` carries
/// module-specific keys this engine doesn't interpret itself (e.g. a
/// matcher implementation's own tuning knobs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub enabled: bool,
    pub lib: Option<String>,
    pub priority: Option<i32>,
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// Top-level parsed configuration value. The core never loads this from
/// disk itself (spec §1: "the core consumes a parsed configuration
/// value") — callers deserialize it with `serde_json`/`toml` and hand it
/// in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub persist: PersistConfig,
    #[serde(default, rename = "mod")]
    pub modules: std::collections::HashMap<String, ModuleConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            timer: TimerConfig::default(),
            matching: MatchingConfig::default(),
            log: LogConfig::default(),
            persist: PersistConfig::default(),
            modules: std::collections::HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matching_config_enables_all_policies() {
        let config = MatchingConfig::default();
        assert!(config.updown_price_limit);
        assert!(config.liquidity_limit);
        assert!(config.volume_limit);
    }

    #[test]
    fn engine_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
