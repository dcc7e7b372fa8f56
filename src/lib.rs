//! Make-up exam slot scheduler.
//!
//! Places every pending (course, subject) exam into a free timetable slot so
//! that no student sits two exams at once, nobody sits more than the daily
//! cap, subjects shared by courses line up, and the latest slot used is as
//! early as possible.
//!
//! ```no_run
//! use makeup_sched::{RawInput, SchedulerConfig, schedule_exams};
//!
//! let config = SchedulerConfig::default();
//! let raw = RawInput::load("data", &config.files)?;
//! let (_relations, schedule) = schedule_exams(&raw, &config)?;
//! println!("latest slot: {}", schedule.latest_slot);
//! # Ok::<(), makeup_sched::SchedulerError>(())
//! ```

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod export;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod relations;
pub mod verify;

pub use config::{EngineKind, InputFiles, SchedulerConfig};
pub use decode::ExamSchedule;
pub use error::{Result, SchedulerError};
pub use export::{export_workbooks, write_json};
pub use input::RawInput;
pub use pipeline::{schedule_exams, schedule_relations};
pub use relations::Relations;
pub use verify::{Violation, verify_schedule};
