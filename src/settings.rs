//! Engine tuning and configuration
//!
//! Loaded from TOML or JSON files; every section falls back to its default so
//! partial files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON parse/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Collision world tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Broad-phase grid cell size
    pub cell_size: f32,
    /// Restitution used by the equal-mass impulse (0 = inelastic, 1 = elastic)
    pub restitution: f32,
    /// Friction given to entities created without an explicit value
    pub default_friction: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            restitution: 0.5,
            default_friction: 4.0,
        }
    }
}

/// A* planner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Grid step (0 = use the broad-phase cell size)
    pub cell_size: f32,
    /// Side length of the walkability probe box, as a fraction of the cell size
    pub probe_fraction: f32,
    /// Maximum node expansions before giving up
    pub max_expansions: usize,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            cell_size: 0.0,
            probe_fraction: 0.4,
            max_expansions: 4096,
        }
    }
}

/// Per-observer detection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Rate (1/s) at which smoothed detection moves toward the window mean
    pub smoothing_rate: f32,
    /// Smoothed detection above this enters CHASE
    pub chase_threshold: f32,
    /// Smoothed detection above this (from PATROL) enters INVESTIGATE
    pub investigate_threshold: f32,
    /// Suspicion gain per second at full detection
    pub suspicion_gain: f32,
    /// Flat suspicion decay per second while nothing is seen
    pub suspicion_decay: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            smoothing_rate: 6.0,
            chase_threshold: 0.8,
            investigate_threshold: 0.3,
            suspicion_gain: 30.0,
            suspicion_decay: 20.0,
        }
    }
}

/// Global alert aggregator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    /// Seconds between aggregator evaluations
    pub update_interval: f32,
    /// Alert gain per second while the recent mean is above `rise_threshold`
    pub rise_rate: f32,
    /// Alert loss per second while the recent mean is below `fall_threshold`
    pub fall_rate: f32,
    pub rise_threshold: f32,
    pub fall_threshold: f32,
    /// Alert level above which a global escalation fires
    pub escalation_threshold: f32,
    /// Minimum seconds between escalations
    pub escalation_cooldown: f32,
    /// Extra visibility at full alert (0.5 = +50%)
    pub alert_visibility_surcharge: f32,
    pub min_visibility: f32,
    pub max_visibility: f32,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            update_interval: 0.1,
            rise_rate: 20.0,
            fall_rate: 10.0,
            rise_threshold: 0.5,
            fall_threshold: 0.1,
            escalation_threshold: 80.0,
            escalation_cooldown: 5.0,
            alert_visibility_surcharge: 0.5,
            min_visibility: 0.05,
            max_visibility: 3.0,
        }
    }
}

/// All engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub collision: CollisionSettings,
    pub path: PathSettings,
    pub detection: DetectionSettings,
    pub aggregator: AggregatorSettings,
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = toml::from_str(s)?;
        settings.validate();
        Ok(settings)
    }

    /// Parse settings from a JSON string
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = serde_json::from_str(s)?;
        settings.validate();
        Ok(settings)
    }

    /// Load settings from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let settings = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents)?,
            Some("json") => Self::from_json_str(&contents)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a `.toml` or `.json` file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(self)?,
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        std::fs::write(path, contents)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Effective A* grid step
    pub fn path_cell_size(&self) -> f32 {
        if self.path.cell_size > 0.0 {
            self.path.cell_size
        } else {
            self.collision.cell_size
        }
    }

    /// Replace nonsensical values with defaults (tolerated, not fatal)
    pub fn validate(&mut self) {
        let defaults = Settings::default();

        if !(self.collision.cell_size > 0.0) {
            log::warn!(
                "collision.cell_size {} is not positive, using {}",
                self.collision.cell_size,
                defaults.collision.cell_size
            );
            self.collision.cell_size = defaults.collision.cell_size;
        }
        self.collision.restitution = self.collision.restitution.clamp(0.0, 1.0);
        self.collision.default_friction = self.collision.default_friction.max(0.0);

        if !(self.path.probe_fraction > 0.0 && self.path.probe_fraction <= 1.0) {
            log::warn!(
                "path.probe_fraction {} out of (0, 1], using {}",
                self.path.probe_fraction,
                defaults.path.probe_fraction
            );
            self.path.probe_fraction = defaults.path.probe_fraction;
        }
        if self.path.max_expansions == 0 {
            self.path.max_expansions = defaults.path.max_expansions;
        }

        let det = &mut self.detection;
        if det.investigate_threshold >= det.chase_threshold {
            log::warn!(
                "detection thresholds out of order ({} >= {}), using defaults",
                det.investigate_threshold,
                det.chase_threshold
            );
            det.investigate_threshold = defaults.detection.investigate_threshold;
            det.chase_threshold = defaults.detection.chase_threshold;
        }
        det.smoothing_rate = det.smoothing_rate.max(0.0);

        let agg = &mut self.aggregator;
        if !(agg.update_interval > 0.0) {
            agg.update_interval = defaults.aggregator.update_interval;
        }
        if agg.fall_threshold > agg.rise_threshold {
            log::warn!(
                "aggregator hysteresis band inverted ({} > {}), using defaults",
                agg.fall_threshold,
                agg.rise_threshold
            );
            agg.fall_threshold = defaults.aggregator.fall_threshold;
            agg.rise_threshold = defaults.aggregator.rise_threshold;
        }
        if agg.min_visibility > agg.max_visibility {
            agg.min_visibility = defaults.aggregator.min_visibility;
            agg.max_visibility = defaults.aggregator.max_visibility;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let s = Settings::default();
        assert_eq!(s.detection.chase_threshold, 0.8);
        assert_eq!(s.detection.investigate_threshold, 0.3);
        assert_eq!(s.aggregator.rise_rate, 20.0);
        assert_eq!(s.aggregator.fall_rate, 10.0);
        assert_eq!(s.aggregator.escalation_cooldown, 5.0);
        assert_eq!(s.path_cell_size(), s.collision.cell_size);
    }

    #[test]
    fn test_partial_toml() {
        let s = Settings::from_toml_str(
            r#"
            [collision]
            cell_size = 32.0

            [aggregator]
            rise_rate = 40.0
            "#,
        )
        .unwrap();
        assert_eq!(s.collision.cell_size, 32.0);
        assert_eq!(s.aggregator.rise_rate, 40.0);
        // Untouched fields keep defaults
        assert_eq!(s.aggregator.fall_rate, 10.0);
        assert_eq!(s.detection.smoothing_rate, 6.0);
    }

    #[test]
    fn test_json_round_trip() {
        let mut s = Settings::default();
        s.path.max_expansions = 128;
        let json = serde_json::to_string(&s).unwrap();
        let back = Settings::from_json_str(&json).unwrap();
        assert_eq!(back.path.max_expansions, 128);
    }

    #[test]
    fn test_validate_repairs_bad_values() {
        let s = Settings::from_toml_str(
            r#"
            [collision]
            cell_size = -5.0
            restitution = 3.0

            [detection]
            chase_threshold = 0.2
            investigate_threshold = 0.6
            "#,
        )
        .unwrap();
        assert_eq!(s.collision.cell_size, DEFAULT_CELL_SIZE);
        assert_eq!(s.collision.restitution, 1.0);
        assert!(s.detection.investigate_threshold < s.detection.chase_threshold);
    }

    #[test]
    fn test_bad_toml_is_error() {
        let err = Settings::from_toml_str("[collision\ncell_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Settings::default().save("settings.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
