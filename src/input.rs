//! Raw input snapshots, as produced by the data-entry tools.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::InputFiles;
use crate::error::InputError;

/// course → day name → occupancy code per period (0 = free).
pub type Timetables = BTreeMap<String, BTreeMap<String, Vec<u32>>>;

/// course → student → subjects the student must sit.
pub type Rosters = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// course → subject → slots already examined in class.
pub type ExamsInClass = BTreeMap<String, BTreeMap<String, Vec<usize>>>;

/// Everything one scheduling run reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub timetables: Timetables,
    pub days: Vec<String>,
    pub rosters: Rosters,
    #[serde(default)]
    pub exams_in_class: ExamsInClass,
}

impl RawInput {
    /// Reads the four snapshots from `dir`.
    ///
    /// The in-class exam file is optional; when absent no subject is excluded.
    pub fn load(dir: impl AsRef<Path>, files: &InputFiles) -> Result<Self, InputError> {
        let dir = dir.as_ref();
        let timetables: Timetables = read_json(&dir.join(&files.timetables))?;
        let days: Vec<String> = read_json(&dir.join(&files.days))?;
        let rosters: Rosters = read_json(&dir.join(&files.rosters))?;

        let exams_path = dir.join(&files.exams_in_class);
        let exams_in_class: ExamsInClass = if exams_path.exists() {
            read_json(&exams_path)?
        } else {
            debug!(path = %exams_path.display(), "no in-class exam file, nothing excluded");
            ExamsInClass::new()
        };

        info!(
            courses = timetables.len(),
            days = days.len(),
            students = rosters.values().map(BTreeMap::len).sum::<usize>(),
            "loaded input snapshots"
        );

        Ok(Self {
            timetables,
            days,
            rosters,
            exams_in_class,
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}
