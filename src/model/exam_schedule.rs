//! Building, solving and diagnosing the exam model.

use std::time::Duration;

use tracing::{info, warn};

use super::model_context::{ConstraintToggles, ExamVar, ModelBuilderContext, build_model_pipeline};
use crate::config::{EngineKind, SchedulerConfig};
use crate::engine::{ConstraintEngine, SolveParams, SolveStatus, create_engine};
use crate::error::{ModelError, SchedulerError, SolveError};
use crate::relations::{CourseId, Relations, Slot, SubjectId};

/// A fully posted model, ready for one solve.
pub struct ExamModel<'a> {
    ctx: ModelBuilderContext<'a>,
}

impl<'a> ExamModel<'a> {
    pub fn build(
        relations: &'a Relations,
        engine: Box<dyn ConstraintEngine>,
        max_exams_per_day: i64,
    ) -> Result<Self, ModelError> {
        Self::build_with_toggles(relations, engine, max_exams_per_day, ConstraintToggles::ALL)
    }

    pub fn build_with_toggles(
        relations: &'a Relations,
        engine: Box<dyn ConstraintEngine>,
        max_exams_per_day: i64,
        toggles: ConstraintToggles,
    ) -> Result<Self, ModelError> {
        let mut ctx =
            ModelBuilderContext::new_with_toggles(relations, engine, max_exams_per_day, toggles);
        build_model_pipeline(&mut ctx)?;
        Ok(Self { ctx })
    }

    pub fn exams(&self) -> &[ExamVar] {
        &self.ctx.exams
    }

    pub fn engine_name(&self) -> &'static str {
        self.ctx.engine.name()
    }

    /// Runs the engine. Anything but an optimal or feasible result is an error.
    pub fn solve(mut self, params: &SolveParams) -> Result<SolvedExams, SolveError> {
        let response = self.ctx.engine.solve(params);
        if !response.status.has_solution() {
            return Err(SolveError::NoSolution {
                status: response.status,
                diagnostics: Vec::new(),
            });
        }

        let mut assignments = Vec::with_capacity(self.ctx.exams.len());
        for exam in &self.ctx.exams {
            let Some(value) = response.value(exam.var) else {
                return Err(SolveError::NoSolution {
                    status: SolveStatus::ModelInvalid,
                    diagnostics: Vec::new(),
                });
            };
            assignments.push(ExamAssignment {
                course: exam.course,
                subject: exam.subject,
                slot: value as Slot,
            });
        }
        let objective = assignments
            .iter()
            .map(|a| a.slot)
            .max()
            .unwrap_or(0);

        Ok(SolvedExams {
            status: response.status,
            objective,
            assignments,
            wall_time: response.wall_time,
        })
    }
}

/// The slot chosen for one (course, subject) exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamAssignment {
    pub course: CourseId,
    pub subject: SubjectId,
    pub slot: Slot,
}

/// A successful solve, not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedExams {
    /// `Optimal` or `Feasible`.
    pub status: SolveStatus,
    /// Latest slot used, 0 when nothing was scheduled.
    pub objective: Slot,
    pub assignments: Vec<ExamAssignment>,
    pub wall_time: Duration,
}

/// Outcome of one relaxed re-solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRun {
    pub toggles: ConstraintToggles,
    pub status: SolveStatus,
}

impl std::fmt::Display for DiagnosticRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.toggles, self.status)
    }
}

/// Re-solves with each constraint group disabled in turn.
///
/// A relaxation that becomes feasible points at the group responsible.
pub fn diagnose_infeasibility(
    relations: &Relations,
    engine: EngineKind,
    max_exams_per_day: i64,
    params: &SolveParams,
) -> Vec<DiagnosticRun> {
    let relaxations = ConstraintToggles::relaxations();
    let params = params
        .clone()
        .with_time_limit(params.time_limit / relaxations.len() as u32);

    let mut runs = Vec::with_capacity(relaxations.len());
    for toggles in relaxations {
        let status = match create_engine(engine) {
            Ok(engine) => {
                match ExamModel::build_with_toggles(relations, engine, max_exams_per_day, toggles) {
                    Ok(model) => match model.solve(&params) {
                        Ok(solved) => solved.status,
                        Err(SolveError::NoSolution { status, .. }) => status,
                        Err(_) => SolveStatus::ModelInvalid,
                    },
                    Err(_) => SolveStatus::Infeasible,
                }
            }
            Err(_) => SolveStatus::ModelInvalid,
        };
        warn!(relaxation = %toggles, %status, "[DIAG] constraint groups");
        runs.push(DiagnosticRun { toggles, status });
    }
    runs
}

/// Builds and solves the model for `relations` with the configured engine.
///
/// The configuration is validated first, so builder-made configs get the
/// same checks as loaded ones.
pub fn solve_exams(
    relations: &Relations,
    config: &SchedulerConfig,
) -> Result<SolvedExams, SchedulerError> {
    config.validate()?;
    let params = SolveParams::from_config(config);
    let engine = create_engine(config.engine)?;
    let model = ExamModel::build(relations, engine, config.max_exams_per_day)?;
    info!(
        engine = model.engine_name(),
        exams = model.exams().len(),
        time_limit = ?params.time_limit,
        "solving exam model"
    );

    match model.solve(&params) {
        Ok(solved) => {
            info!(
                status = %solved.status,
                latest_slot = solved.objective,
                elapsed = ?solved.wall_time,
                "exam model solved"
            );
            Ok(solved)
        }
        Err(SolveError::NoSolution { status, .. }) if config.diagnose_infeasibility => {
            warn!(%status, "no exam schedule found, running relaxations");
            let diagnostics =
                diagnose_infeasibility(relations, config.engine, config.max_exams_per_day, &params);
            Err(SolveError::NoSolution {
                status,
                diagnostics,
            }
            .into())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::native::NativeEngine;
    use crate::input::RawInput;
    use crate::relations::tests::two_course_input;
    use std::collections::BTreeMap;

    fn relations(raw: &RawInput) -> Relations {
        Relations::build(raw).unwrap()
    }

    fn solve(relations: &Relations, cap: i64) -> Result<SolvedExams, SolveError> {
        let model = ExamModel::build(relations, Box::new(NativeEngine::new()), cap).unwrap();
        model.solve(&SolveParams::default())
    }

    fn slot(solved: &SolvedExams, relations: &Relations, course: &str, subject: &str) -> Slot {
        let course = relations.course_id(course).unwrap();
        let subject = relations.subject_id(subject).unwrap();
        solved
            .assignments
            .iter()
            .find(|a| a.course == course && a.subject == subject)
            .unwrap()
            .slot
    }

    #[test]
    fn test_two_course_scenario() {
        let relations = relations(&two_course_input());
        let solved = solve(&relations, 3).unwrap();

        assert_eq!(solved.status, SolveStatus::Optimal);
        assert_eq!(solved.objective, 1);
        assert_eq!(slot(&solved, &relations, "A", "MAT"), 0);
        assert_eq!(slot(&solved, &relations, "B", "MAT"), 0);
        assert_eq!(slot(&solved, &relations, "A", "FIS"), 1);
    }

    #[test]
    fn test_one_variable_per_course_subject() {
        let relations = relations(&two_course_input());
        let model = ExamModel::build(&relations, Box::new(NativeEngine::new()), 3).unwrap();
        assert_eq!(model.exams().len(), 3);
        assert_eq!(model.engine_name(), "native");
    }

    #[test]
    fn test_course_without_free_slot_fails_to_build() {
        let mut raw = two_course_input();
        raw.timetables.get_mut("B").unwrap().insert("seg".into(), vec![1, 1]);
        raw.timetables.get_mut("B").unwrap().insert("ter".into(), vec![1, 1]);
        let relations = relations(&raw);

        let err = ExamModel::build(&relations, Box::new(NativeEngine::new()), 3).err();
        assert_eq!(
            err,
            Some(ModelError::EmptyDomain {
                course: "B".into(),
                subjects: 1,
            })
        );
    }

    #[test]
    fn test_pairs_without_common_slot_stay_independent() {
        let mut raw = two_course_input();
        // A is free only on seg, B only on ter1.
        raw.timetables.get_mut("A").unwrap().insert("seg".into(), vec![0, 0]);
        raw.timetables.get_mut("A").unwrap().insert("ter".into(), vec![1, 1]);
        raw.timetables.get_mut("B").unwrap().insert("seg".into(), vec![1, 1]);
        raw.timetables.get_mut("B").unwrap().insert("ter".into(), vec![1, 0]);
        let relations = relations(&raw);
        let solved = solve(&relations, 3).unwrap();

        assert_eq!(slot(&solved, &relations, "A", "MAT"), 0);
        assert_eq!(slot(&solved, &relations, "A", "FIS"), 1);
        assert_eq!(slot(&solved, &relations, "B", "MAT"), 3);
        assert_eq!(solved.objective, 3);
    }

    #[test]
    fn test_incompatible_three_course_sync_is_rejected() {
        // A∩B = {0}, B∩C = {1}, A∩C = {} : pairwise links chain A-B-C.
        let mut raw = RawInput {
            days: vec!["seg".into()],
            ..RawInput::default()
        };
        for (course, row) in [("A", vec![0, 1, 1]), ("B", vec![0, 0, 1]), ("C", vec![1, 0, 1])] {
            raw.timetables
                .insert(course.into(), BTreeMap::from([("seg".to_string(), row)]));
            raw.rosters.insert(
                course.into(),
                BTreeMap::from([("s".to_string(), vec!["MAT".to_string()])]),
            );
        }
        let relations = relations(&raw);
        let err = ExamModel::build(&relations, Box::new(NativeEngine::new()), 3).err();
        assert_eq!(
            err,
            Some(ModelError::IncompatibleSync {
                subject: "MAT".into(),
                courses: vec!["A".into(), "B".into(), "C".into()],
            })
        );
    }

    #[test]
    fn test_daily_cap_spreads_exams() {
        let mut raw = RawInput {
            days: vec!["seg".into(), "ter".into()],
            ..RawInput::default()
        };
        raw.timetables.insert(
            "A".into(),
            BTreeMap::from([
                ("seg".to_string(), vec![0, 0, 0, 0]),
                ("ter".to_string(), vec![0, 0, 0, 0]),
            ]),
        );
        let subjects = ["S1", "S2", "S3", "S4"].map(String::from).to_vec();
        raw.rosters
            .insert("A".into(), BTreeMap::from([("ana".to_string(), subjects)]));
        let relations = relations(&raw);

        let relaxed = solve(&relations, 4).unwrap();
        assert_eq!(relaxed.objective, 3);

        let capped = solve(&relations, 3).unwrap();
        assert_eq!(capped.objective, 4);
        let first_day = capped.assignments.iter().filter(|a| a.slot < 4).count();
        assert_eq!(first_day, 3);
    }

    #[test]
    fn test_infeasible_model_reports_no_solution() {
        let mut raw = two_course_input();
        // A has a single free slot for two subjects of the same student.
        raw.timetables.get_mut("A").unwrap().insert("seg".into(), vec![0, 1]);
        raw.timetables.get_mut("A").unwrap().insert("ter".into(), vec![1, 1]);
        let relations = relations(&raw);

        let err = solve(&relations, 3).unwrap_err();
        assert!(matches!(
            err,
            SolveError::NoSolution {
                status: SolveStatus::Infeasible,
                ..
            }
        ));
    }

    #[test]
    fn test_diagnostics_point_at_conflicts() {
        let mut raw = two_course_input();
        raw.timetables.get_mut("A").unwrap().insert("seg".into(), vec![0, 1]);
        raw.timetables.get_mut("A").unwrap().insert("ter".into(), vec![1, 1]);
        let relations = relations(&raw);
        let config = SchedulerConfig::default();

        let err = solve_exams(&relations, &config).unwrap_err();
        let diagnostics = match err {
            SchedulerError::Solve(SolveError::NoSolution { diagnostics, .. }) => diagnostics,
            other => panic!("expected NoSolution, got {other}"),
        };
        assert_eq!(diagnostics.len(), 3);
        let feasible: Vec<_> = diagnostics
            .iter()
            .filter(|run| run.status.has_solution())
            .map(|run| run.toggles)
            .collect();
        assert_eq!(
            feasible,
            vec![ConstraintToggles {
                conflicts: false,
                ..ConstraintToggles::ALL
            }]
        );
    }

    #[test]
    fn test_builder_configs_are_validated_before_solving() {
        let relations = relations(&two_course_input());
        for config in [
            SchedulerConfig::default().with_time_limit_secs(-1.0),
            SchedulerConfig::default().with_time_limit_secs(1e20),
            SchedulerConfig::default().with_max_exams_per_day(0),
        ] {
            let err = solve_exams(&relations, &config).unwrap_err();
            assert!(matches!(err, SchedulerError::Config(_)), "{err}");
        }
    }

    #[test]
    fn test_spent_budget_without_solution_is_unknown() {
        let relations = relations(&two_course_input());
        let mut config = SchedulerConfig::default().with_time_limit_secs(1e-9);
        config.check_interval = 1;
        config.diagnose_infeasibility = false;

        let err = solve_exams(&relations, &config).unwrap_err();
        assert!(
            matches!(
                err,
                SchedulerError::Solve(SolveError::NoSolution {
                    status: SolveStatus::Unknown,
                    ref diagnostics,
                }) if diagnostics.is_empty()
            ),
            "{err}"
        );
    }
}
