//! Run configuration.
//!
//! Every field has a default, so a missing or partial `solver.toml` is fine:
//!
//! ```
//! use makeup_sched::config::{EngineKind, SchedulerConfig};
//! use std::time::Duration;
//!
//! let config = SchedulerConfig::from_toml_str(r#"
//!     time_limit_secs = 30
//!     engine = "native"
//!
//!     [files]
//!     rosters = "students.json"
//! "#).unwrap();
//!
//! assert_eq!(config.time_limit(), Duration::from_secs(30));
//! assert_eq!(config.max_exams_per_day, 3);
//! assert_eq!(config.engine, EngineKind::Native);
//! assert_eq!(config.files.rosters, "students.json");
//! assert_eq!(config.files.days, "Dias.json");
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which constraint engine runs the search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Built-in branch and bound.
    #[default]
    Native,
    /// OR-tools CP-SAT, requires the `cp-sat` feature.
    CpSat,
}

impl EngineKind {
    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Native => "native",
            EngineKind::CpSat => "cp-sat",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of the four input snapshots inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputFiles {
    pub timetables: String,
    pub days: String,
    pub rosters: String,
    pub exams_in_class: String,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            timetables: "Horarios.json".to_string(),
            days: "Dias.json".to_string(),
            rosters: "AlunosEmRecuperacao.json".to_string(),
            exams_in_class: "ExamesEmAula.json".to_string(),
        }
    }
}

/// Main run configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock budget for one solve.
    pub time_limit_secs: f64,

    /// Maximum number of exams a student sits on one day.
    pub max_exams_per_day: i64,

    pub engine: EngineKind,

    /// Parallel workers, CP-SAT only.
    pub num_search_workers: i32,

    /// CP-SAT only.
    pub random_seed: i32,

    /// Native engine: nodes between two clock reads.
    pub check_interval: u64,

    /// Re-solve with constraint groups disabled when no schedule exists.
    pub diagnose_infeasibility: bool,

    pub files: InputFiles,

    /// Row labels of the exported grids, one per period.
    pub time_labels: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 10.0,
            max_exams_per_day: 3,
            engine: EngineKind::default(),
            num_search_workers: 8,
            random_seed: 42,
            check_interval: 1024,
            diagnose_infeasibility: true,
            files: InputFiles::default(),
            time_labels: [
                "07:00 – 07:55",
                "07:55 – 08:50",
                "09:10 – 10:05",
                "10:05 – 11:00",
                "13:00 – 13:55",
                "13:55 – 14:50",
                "15:10 – 16:05",
                "16:05 – 17:00",
            ]
            .iter()
            .map(|label| label.to_string())
            .collect(),
        }
    }
}

impl SchedulerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be read, contains invalid TOML,
    /// or fails [`SchedulerConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads configuration from `path`, falling back to defaults when the file doesn't exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let representable = Duration::try_from_secs_f64(self.time_limit_secs).is_ok();
        if self.time_limit_secs <= 0.0 || !representable {
            return Err(ConfigError::Invalid(format!(
                "time_limit_secs must be a positive, representable duration, got {}",
                self.time_limit_secs
            )));
        }
        if self.max_exams_per_day < 1 {
            return Err(ConfigError::Invalid(format!(
                "max_exams_per_day must be at least 1, got {}",
                self.max_exams_per_day
            )));
        }
        if self.check_interval == 0 {
            return Err(ConfigError::Invalid(
                "check_interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The solve budget. Out-of-range values saturate; [`validate`](Self::validate)
    /// rejects them.
    pub fn time_limit(&self) -> Duration {
        match Duration::try_from_secs_f64(self.time_limit_secs) {
            Ok(limit) => limit,
            Err(_) if self.time_limit_secs > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_time_limit_secs(mut self, seconds: f64) -> Self {
        self.time_limit_secs = seconds;
        self
    }

    pub fn with_max_exams_per_day(mut self, cap: i64) -> Self {
        self.max_exams_per_day = cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = SchedulerConfig::default();
        assert_eq!(config.time_limit(), Duration::from_secs(10));
        assert_eq!(config.max_exams_per_day, 3);
        assert_eq!(config.engine, EngineKind::Native);
        assert_eq!(config.time_labels.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_engine_names() {
        let config = SchedulerConfig::from_toml_str(r#"engine = "cp-sat""#).unwrap();
        assert_eq!(config.engine, EngineKind::CpSat);
        assert_eq!(config.engine.to_string(), "cp-sat");
        assert!(SchedulerConfig::from_toml_str(r#"engine = "gurobi""#).is_err());
    }

    #[test]
    fn test_rejects_invalid_limits() {
        let err = SchedulerConfig::from_toml_str("time_limit_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SchedulerConfig::from_toml_str("max_exams_per_day = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SchedulerConfig::from_toml_str("check_interval = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unrepresentable_time_limit() {
        for secs in ["1e20", "inf", "nan", "-3"] {
            let err = SchedulerConfig::from_toml_str(&format!("time_limit_secs = {secs}"))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{secs}");
        }
    }

    #[test]
    fn test_time_limit_never_panics() {
        let config = SchedulerConfig::default().with_time_limit_secs(1e20);
        assert!(config.validate().is_err());
        assert_eq!(config.time_limit(), Duration::MAX);

        let config = SchedulerConfig::default().with_time_limit_secs(f64::NAN);
        assert_eq!(config.time_limit(), Duration::ZERO);

        let config = SchedulerConfig::default().with_time_limit_secs(-1.0);
        assert_eq!(config.time_limit(), Duration::ZERO);
    }

    #[test]
    fn test_default_file_names() {
        let files = InputFiles::default();
        assert_eq!(files.timetables, "Horarios.json");
        assert_eq!(files.days, "Dias.json");
        assert_eq!(files.rosters, "AlunosEmRecuperacao.json");
        assert_eq!(files.exams_in_class, "ExamesEmAula.json");
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = SchedulerConfig::load_or_default(dir.path().join("solver.toml")).unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solver.toml");
        std::fs::write(&path, "max_exams_per_day = 2\ncheck_interval = 8\n").unwrap();

        let config = SchedulerConfig::load(&path).unwrap();
        assert_eq!(config.max_exams_per_day, 2);
        assert_eq!(config.check_interval, 8);
    }
}
