//! End-to-end scheduling run: relations, model, solve, decode, verify.

use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::decode::ExamSchedule;
use crate::error::{Result, SolveError};
use crate::model::solve_exams;
use crate::relations::Relations;
use crate::verify::verify_schedule;

/// Schedules every make-up exam described by `raw`.
///
/// Also returns the relations, which the spreadsheet exporter needs.
pub fn schedule_exams(
    raw: &crate::input::RawInput,
    config: &SchedulerConfig,
) -> Result<(Relations, ExamSchedule)> {
    let relations = Relations::build(raw)?;
    let schedule = schedule_relations(&relations, config)?;
    Ok((relations, schedule))
}

/// Solves, decodes and verifies an already built set of relations.
pub fn schedule_relations(relations: &Relations, config: &SchedulerConfig) -> Result<ExamSchedule> {
    let schedule = solve_exams(relations, config)?.decode(relations);

    let violations = verify_schedule(relations, &schedule, config.max_exams_per_day);
    if let Some(first) = violations.first() {
        for violation in &violations {
            error!(%violation, "schedule verification failed");
        }
        return Err(SolveError::Verification {
            count: violations.len(),
            first: first.to_string(),
        }
        .into());
    }

    info!(
        courses = schedule.courses.len(),
        exams = schedule.exam_count(),
        latest_slot = schedule.latest_slot,
        proven_optimal = schedule.proven_optimal,
        "exam schedule ready"
    );
    Ok(schedule)
}
