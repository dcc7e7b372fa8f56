//! Error types for every stage of the scheduling pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::SolveStatus;
use crate::model::DiagnosticRun;

/// Failure to read one of the raw input snapshots.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The raw snapshots are inconsistent with each other.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelationError {
    #[error("the day list is empty")]
    NoDays,

    #[error("no course timetables were provided")]
    NoCourses,

    #[error("course `{course}` has no grid for day `{day}`")]
    MissingDay { course: String, day: String },

    #[error(
        "course `{course}` has {found} periods on `{day}`, expected {expected} like the reference course"
    )]
    InconsistentGrid {
        course: String,
        day: String,
        expected: usize,
        found: usize,
    },

    #[error("the roster names course `{0}`, which has no timetable")]
    UnknownRosterCourse(String),
}

/// The relations cannot be turned into a satisfiable model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("course `{course}` must examine {subjects} subject(s) but has no free slot")]
    EmptyDomain { course: String, subjects: usize },

    #[error("subject `{subject}` is synchronized across {courses:?}, which share no common free slot")]
    IncompatibleSync {
        subject: String,
        courses: Vec<String>,
    },
}

/// The engine finished without a usable schedule.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("no feasible exam schedule found (engine status: {status}){}", describe_runs(.diagnostics))]
    NoSolution {
        status: SolveStatus,
        diagnostics: Vec<DiagnosticRun>,
    },

    #[error("the `{0}` engine is not available in this build")]
    EngineUnavailable(&'static str),

    #[error("decoded schedule violates {count} constraint(s), first: {first}")]
    Verification { count: usize, first: String },
}

fn describe_runs(runs: &[DiagnosticRun]) -> String {
    if runs.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = runs.iter().map(ToString::to_string).collect();
    format!("; relaxations: {}", parts.join(", "))
}

/// Failure while writing the decoded schedule.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize the schedule: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error for course `{course}`: {source}")]
    Xlsx {
        course: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Any failure of a full scheduling run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
