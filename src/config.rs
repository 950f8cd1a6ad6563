use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::game::rotation::GROUP_COUNT;

pub const CONFIG_PATH: &str = "joyride.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] ini::Error),
    #[error("timing windows must satisfy 0 < perfect ({perfect}) < great ({great}) < ok ({ok}) < consideration ({consideration})")]
    UnorderedWindows {
        perfect: f32,
        great: f32,
        ok: f32,
        consideration: f32,
    },
    #[error("penalty window {penalty} must lie in [0, consideration window {consideration})")]
    PenaltyWindow { penalty: f32, consideration: f32 },
    #[error("rotation duration must be positive, got {0}")]
    RotationDuration(f32),
    #[error("table density must be positive, got {0}")]
    TableDensity(f32),
    #[error("global start offset must be finite and non-negative, got {0}")]
    StartOffset(f32),
    #[error("expected one segment multiplier per group (8), got {0}")]
    MultiplierCount(usize),
    #[error("segment multiplier {index} must be positive, got {value}")]
    Multiplier { index: usize, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

/// Judgement and animation constants. All windows are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    /// Lookup table buckets per second.
    pub table_density: f32,
    pub consideration_window: f32,
    /// How long a just-passed note keeps its lane slot before yielding to the next one.
    pub penalty_window: f32,
    pub perfect_window: f32,
    pub great_window: f32,
    pub ok_window: f32,
    pub rotation_duration: f32,
    // Lead-in added to every note when a segment is compiled.
    pub global_start_offset: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            table_density: 10.0,
            consideration_window: 0.15,
            penalty_window: 0.03,
            perfect_window: 0.016,
            great_window: 0.05,
            ok_window: 0.1,
            rotation_duration: 0.6,
            global_start_offset: 1.5,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.perfect_window > 0.0
            && self.perfect_window < self.great_window
            && self.great_window < self.ok_window
            && self.ok_window < self.consideration_window;
        if !ordered {
            return Err(ConfigError::UnorderedWindows {
                perfect: self.perfect_window,
                great: self.great_window,
                ok: self.ok_window,
                consideration: self.consideration_window,
            });
        }
        if !(self.penalty_window >= 0.0 && self.penalty_window < self.consideration_window) {
            return Err(ConfigError::PenaltyWindow {
                penalty: self.penalty_window,
                consideration: self.consideration_window,
            });
        }
        // Written as negations so NaN fails too.
        if !(self.rotation_duration > 0.0) {
            return Err(ConfigError::RotationDuration(self.rotation_duration));
        }
        if !(self.table_density > 0.0) || !self.table_density.is_finite() {
            return Err(ConfigError::TableDensity(self.table_density));
        }
        if !(self.global_start_offset >= 0.0) || !self.global_start_offset.is_finite() {
            return Err(ConfigError::StartOffset(self.global_start_offset));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub timing: TimingConfig,
    /// Score multiplier per ring segment, indexed by group id.
    pub segment_multipliers: [f64; GROUP_COUNT],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            timing: TimingConfig::default(),
            segment_multipliers: [1.0, 2.0, 3.0, 5.0, 8.0, 5.0, 3.0, 2.0],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        for (index, &value) in self.segment_multipliers.iter().enumerate() {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::Multiplier { index, value });
            }
        }
        Ok(())
    }
}

fn join_multipliers(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn default_ini() -> Ini {
    let default = Config::default();
    let t = default.timing;
    let mut conf = Ini::new();
    conf.with_section(Some("Options"))
        .set("LogLevel", default.log_level.as_str());
    conf.with_section(Some("Timing"))
        .set("ConsiderationWindow", t.consideration_window.to_string())
        .set("GlobalStartOffset", t.global_start_offset.to_string())
        .set("GreatWindow", t.great_window.to_string())
        .set("OkWindow", t.ok_window.to_string())
        .set("PenaltyWindow", t.penalty_window.to_string())
        .set("PerfectWindow", t.perfect_window.to_string())
        .set("RotationDuration", t.rotation_duration.to_string())
        .set("TableDensity", t.table_density.to_string());
    conf.with_section(Some("Scoring"))
        .set("Multipliers", join_multipliers(&default.segment_multipliers));
    conf
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    default_ini().write_to_file(path)
}

fn read_f32(conf: &Ini, section: &str, key: &str, default: f32) -> f32 {
    match conf.get_from(Some(section), key) {
        None => default,
        Some(raw) => raw.trim().parse::<f32>().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {section}.{key}='{raw}', using {default}");
            default
        }),
    }
}

fn read_multipliers(conf: &Ini) -> Result<[f64; GROUP_COUNT], ConfigError> {
    let default = Config::default().segment_multipliers;
    let Some(raw) = conf.get_from(Some("Scoring"), "Multipliers") else {
        return Ok(default);
    };
    let parsed: Result<Vec<f64>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<f64>)
        .collect();
    let Ok(values) = parsed else {
        warn!("Ignoring unparseable Scoring.Multipliers='{raw}'");
        return Ok(default);
    };
    let count = values.len();
    values
        .try_into()
        .map_err(|_| ConfigError::MultiplierCount(count))
}

/// Builds a validated config from already-parsed INI data. Missing keys take
/// their defaults; malformed numbers are logged and defaulted.
pub fn from_ini(conf: &Ini) -> Result<Config, ConfigError> {
    let default = Config::default();
    let d = default.timing;
    let log_level = conf
        .get_from(Some("Options"), "LogLevel")
        .and_then(|v| LogLevel::from_str(v).ok())
        .unwrap_or(default.log_level);
    let timing = TimingConfig {
        table_density: read_f32(conf, "Timing", "TableDensity", d.table_density),
        consideration_window: read_f32(
            conf,
            "Timing",
            "ConsiderationWindow",
            d.consideration_window,
        ),
        penalty_window: read_f32(conf, "Timing", "PenaltyWindow", d.penalty_window),
        perfect_window: read_f32(conf, "Timing", "PerfectWindow", d.perfect_window),
        great_window: read_f32(conf, "Timing", "GreatWindow", d.great_window),
        ok_window: read_f32(conf, "Timing", "OkWindow", d.ok_window),
        rotation_duration: read_f32(conf, "Timing", "RotationDuration", d.rotation_duration),
        global_start_offset: read_f32(conf, "Timing", "GlobalStartOffset", d.global_start_offset),
    };
    let cfg = Config {
        log_level,
        timing,
        segment_multipliers: read_multipliers(conf)?,
    };
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_str(content: &str) -> Result<Config, ConfigError> {
    let conf = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
    from_ini(&conf)
}

/// Loads the config at `path`, writing a default file first when none exists.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        if let Err(e) = create_default_config_file(path) {
            warn!("Failed to create default config file: {e}");
        }
        return from_ini(&default_ini());
    }
    let conf = Ini::load_from_file(path)?;
    let cfg = from_ini(&conf)?;
    info!("Loaded config from '{}'.", path.display());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, LogLevel, TimingConfig, load_str};

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn reads_timing_and_multipliers() {
        let cfg = load_str(
            "[Options]\nLogLevel=debug\n\
             [Timing]\nPerfectWindow=0.02\nRotationDuration=0.4\n\
             [Scoring]\nMultipliers=1, 1, 2, 2, 4, 2, 2, 1\n",
        )
        .expect("config should parse");
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert!((cfg.timing.perfect_window - 0.02).abs() <= f32::EPSILON);
        assert!((cfg.timing.rotation_duration - 0.4).abs() <= f32::EPSILON);
        assert!((cfg.timing.ok_window - TimingConfig::default().ok_window).abs() <= f32::EPSILON);
        assert_eq!(cfg.segment_multipliers[4], 4.0);
    }

    #[test]
    fn unparseable_number_falls_back_to_default() {
        let cfg = load_str("[Timing]\nOkWindow=banana\n").expect("bad numbers are not fatal");
        assert_eq!(cfg.timing.ok_window, TimingConfig::default().ok_window);
    }

    #[test]
    fn rejects_unordered_windows() {
        let err = load_str("[Timing]\nGreatWindow=0.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnorderedWindows { .. }), "got {err:?}");
    }

    #[test]
    fn rejects_non_positive_rotation_duration() {
        let err = load_str("[Timing]\nRotationDuration=0\n").unwrap_err();
        assert!(matches!(err, ConfigError::RotationDuration(_)), "got {err:?}");
    }

    #[test]
    fn rejects_penalty_window_outside_consideration() {
        let err = load_str("[Timing]\nPenaltyWindow=0.15\n").unwrap_err();
        assert!(matches!(err, ConfigError::PenaltyWindow { .. }), "got {err:?}");
        let err = load_str("[Timing]\nPenaltyWindow=-0.01\n").unwrap_err();
        assert!(matches!(err, ConfigError::PenaltyWindow { .. }), "got {err:?}");
    }

    #[test]
    fn rejects_wrong_multiplier_count() {
        let err = load_str("[Scoring]\nMultipliers=1,2,3\n").unwrap_err();
        assert!(matches!(err, ConfigError::MultiplierCount(3)), "got {err:?}");
    }

    #[test]
    fn rejects_zero_multiplier() {
        let err = load_str("[Scoring]\nMultipliers=1,2,3,0,8,5,3,2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Multiplier { index: 3, .. }), "got {err:?}");
    }
}
