//! Session configuration loaded from TOML.
//!
//! ```toml
//! fallback = "refuse"
//! buttons = "queue"
//! tick_period_ms = 10
//! fingerprint_database = "fingerprints.toml"
//!
//! [identification]
//! min_frames = 50
//! max_frames = 20000      # 0: no frame limit
//! max_duration_ms = 2000  # 0: no time limit
//! reject_foreign_ids = false
//!
//! [params]
//! steer_max = 250
//! ```

use crate::buttons::ButtonConflictPolicy;
use crate::controller::FallbackPolicy;
use crate::fingerprint::FingerprintDatabase;
use crate::matcher::MatcherConfig;
use crate::params::{ControlParams, ParamTable};
use crate::runtime::DEFAULT_TICK_PERIOD;
use crate::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identification window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    pub min_frames: u32,
    /// Frames after which the window closes; 0 for no frame limit
    pub max_frames: u32,
    /// Time after which the window closes; 0 for no time limit
    pub max_duration_ms: u64,
    pub reject_foreign_ids: bool,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self::from(&MatcherConfig::default())
    }
}

impl From<&MatcherConfig> for IdentificationConfig {
    fn from(config: &MatcherConfig) -> Self {
        Self {
            min_frames: config.min_frames,
            max_frames: config.max_frames.unwrap_or(0),
            max_duration_ms: config
                .max_duration
                .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            reject_foreign_ids: config.reject_foreign_ids,
        }
    }
}

/// Everything a session needs besides the bus and the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub identification: IdentificationConfig,

    /// Behaviour when identification is not confirmed
    pub fallback: FallbackPolicy,

    /// Behaviour of button requests arriving during a press
    pub buttons: ButtonConflictPolicy,

    /// Parameter overrides applied to every variant; unset fields keep the
    /// MQB values
    pub params: Option<ControlParams>,

    /// Fingerprint database replacing the built-in one
    pub fingerprint_database: Option<PathBuf>,

    pub tick_period_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identification: IdentificationConfig::default(),
            fallback: FallbackPolicy::default(),
            buttons: ButtonConflictPolicy::default(),
            params: None,
            fingerprint_database: None,
            tick_period_ms: DEFAULT_TICK_PERIOD.as_millis() as u64,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file. A relative database path is
    /// resolved against the directory of the file.
    pub fn load(path: impl AsRef<Path>) -> ControlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ControlError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(db), Some(dir)) = (&config.fingerprint_database, path.parent()) {
            if db.is_relative() {
                config.fingerprint_database = Some(dir.join(db));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ControlResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ControlError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ControlResult<()> {
        if self.tick_period_ms == 0 {
            return Err(ControlError::InvalidConfiguration(
                "tick_period_ms must be non-zero".into(),
            ));
        }
        if let Some(params) = &self.params {
            params.validate()?;
        }
        Ok(())
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        let id = &self.identification;
        MatcherConfig {
            min_frames: id.min_frames,
            max_frames: (id.max_frames > 0).then_some(id.max_frames),
            max_duration: (id.max_duration_ms > 0)
                .then(|| Duration::from_millis(id.max_duration_ms)),
            reject_foreign_ids: id.reject_foreign_ids,
        }
    }

    /// The configured database file, or the built-in fingerprints.
    pub fn fingerprint_database(&self) -> ControlResult<Cow<'static, FingerprintDatabase>> {
        match &self.fingerprint_database {
            Some(path) => Ok(Cow::Owned(FingerprintDatabase::load(path)?)),
            None => Ok(Cow::Borrowed(FingerprintDatabase::builtin())),
        }
    }

    /// The parameter overrides for every variant, or the built-in table.
    pub fn param_table(&self) -> Cow<'static, ParamTable> {
        match self.params {
            Some(params) => Cow::Owned(ParamTable::uniform(params)),
            None => Cow::Borrowed(ParamTable::builtin()),
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VehicleVariant;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.matcher_config(), MatcherConfig::default());
        assert_eq!(config.tick_period(), Duration::from_millis(10));
        assert!(matches!(config.param_table(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_full_file() {
        let config = SessionConfig::from_toml_str(
            r#"
            fallback = "generic"
            buttons = "replace"
            tick_period_ms = 20

            [identification]
            min_frames = 10
            max_duration_ms = 500
            reject_foreign_ids = true

            [params]
            steer_max = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.fallback, FallbackPolicy::Generic);
        assert_eq!(config.buttons, ButtonConflictPolicy::Replace);
        assert_eq!(
            config.matcher_config(),
            MatcherConfig {
                min_frames: 10,
                max_frames: Some(20_000),
                max_duration: Some(Duration::from_millis(500)),
                reject_foreign_ids: true,
            }
        );
        let params = config
            .param_table()
            .resolve(VehicleVariant::GolfMk7)
            .unwrap();
        assert_eq!(params.steer_max, 250);
        assert_eq!(params.steer_delta_up, ControlParams::MQB.steer_delta_up);
    }

    #[test]
    fn test_zero_disables_window_limits() {
        let config = SessionConfig::from_toml_str(
            "[identification]\nmin_frames = 10\nmax_frames = 0\nmax_duration_ms = 0\n",
        )
        .unwrap();
        let matcher = config.matcher_config();
        assert_eq!(matcher.max_frames, None);
        assert_eq!(matcher.max_duration, None);

        // Omitted limits keep the defaults.
        let config =
            SessionConfig::from_toml_str("[identification]\nmax_duration_ms = 500\n").unwrap();
        assert_eq!(config.matcher_config().max_frames, Some(20_000));

        let unlimited = MatcherConfig {
            max_frames: None,
            max_duration: None,
            ..Default::default()
        };
        let section = IdentificationConfig::from(&unlimited);
        assert_eq!((section.max_frames, section.max_duration_ms), (0, 0));
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        for content in [
            "tick_period_ms = 0",
            "fallback = \"sometimes\"",
            "[params]\nsteer_delta_down = 0",
            "[identification]\nmin_frames = -1",
        ] {
            assert!(
                matches!(
                    SessionConfig::from_toml_str(content),
                    Err(ControlError::InvalidConfiguration(_))
                ),
                "{content}"
            );
        }
    }

    #[test]
    fn test_missing_database_file() {
        let config = SessionConfig {
            fingerprint_database: Some(PathBuf::from("/nonexistent/fingerprints.toml")),
            ..Default::default()
        };
        assert!(matches!(
            config.fingerprint_database(),
            Err(ControlError::InvalidConfiguration(_))
        ));
        assert!(!SessionConfig::default().fingerprint_database().unwrap().is_empty());
    }
}
