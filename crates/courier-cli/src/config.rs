//! Layered configuration: defaults, then a TOML file, then `COURIER_*` env vars.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use courier_core::queue::DispatchPolicy;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "courier.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub dispatch: DispatchPolicy,
    pub store: StoreConfig,
    pub simulator: SimulatorConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the per-day send counters.
    pub counter_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            counter_path: PathBuf::from("courier-counters.json"),
        }
    }
}

/// Knobs of the stand-in transport used by `courier send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Probability in `[0, 1]` that a send fails transiently.
    #[serde(deserialize_with = "probability")]
    pub failure_rate: f64,

    /// Phones the simulator rejects as invalid numbers.
    pub blocked_phones: Vec<String>,

    pub latency_ms: u64,

    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.05,
            blocked_phones: Vec::new(),
            latency_ms: 500,
            seed: None,
        }
    }
}

fn probability<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        let message = format!("expected a probability in [0, 1], got {value}");
        Err(serde::de::Error::custom(message))
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `path`, or `./courier.toml` when none is given (skipped if missing)
/// 3. `COURIER_*` environment variables, `__` between sections
///    (`COURIER_DISPATCH__DAILY_LIMIT=500`)
pub fn figment(path: Option<&Path>) -> Figment {
    let file = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed("COURIER_").split("__"))
}

pub fn load(path: Option<&Path>) -> Result<CourierConfig, figment::Error> {
    figment(path).extract()
}

#[cfg(test)]
fn load_from_str(toml: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml))
        .extract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::queue::DeliveryMode;
    use std::io::Write;

    #[test]
    fn empty_input_yields_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, CourierConfig::default());
        assert_eq!(config.dispatch.daily_limit, 2_000);
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = load_from_str(
            r#"
            [dispatch]
            daily_limit = 500
            batch_size = 50

            [dispatch.delivery]
            mode = "external"

            [simulator]
            blocked_phones = ["+15550000"]

            [log]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.daily_limit, 500);
        assert_eq!(config.dispatch.batch_size, 50);
        assert_eq!(config.dispatch.messages_per_minute, 20);
        assert_eq!(config.dispatch.delivery, DeliveryMode::External);
        assert_eq!(config.simulator.blocked_phones, vec!["+15550000"]);
        assert_eq!(config.simulator.latency_ms, 500);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(load_from_str("[dispatch]\ndaily_limit = \"lots\"").is_err());
    }

    #[test]
    fn failure_rate_must_be_a_probability() {
        for raw in ["nan", "inf", "-0.5", "1.5"] {
            let toml = format!("[simulator]\nfailure_rate = {raw}");
            assert!(
                load_from_str(&toml).is_err(),
                "accepted failure_rate = {raw}"
            );
        }
        let config = load_from_str("[simulator]\nfailure_rate = 1.0").unwrap();
        assert_eq!(config.simulator.failure_rate, 1.0);
    }

    #[test]
    fn reads_an_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let contents = r#"counter_path = "/var/lib/courier/counts.json""#;
        writeln!(file, "[store]\n{contents}").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(
            config.store.counter_path,
            PathBuf::from("/var/lib/courier/counts.json")
        );
    }
}
