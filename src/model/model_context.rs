//! Shared state for the constraint builders.

use std::collections::HashMap;

use crate::engine::{BoolVar, ConstraintEngine, IntVar};
use crate::error::ModelError;
use crate::relations::{CourseId, Relations, SubjectId};

use super::model_daily::add_daily_load_constraints;
use super::model_exams::{add_conflict_constraints, add_exam_variables, add_makespan_objective};
use super::model_sync::add_sync_constraints;

/// Which constraint groups are posted. All are on for a real run; the
/// infeasibility diagnostics switch them off one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintToggles {
    pub conflicts: bool,
    pub daily_cap: bool,
    pub sync: bool,
}

impl ConstraintToggles {
    pub const ALL: Self = Self {
        conflicts: true,
        daily_cap: true,
        sync: true,
    };

    /// Every toggle set with exactly one group disabled.
    pub fn relaxations() -> [Self; 3] {
        [
            Self {
                conflicts: false,
                ..Self::ALL
            },
            Self {
                daily_cap: false,
                ..Self::ALL
            },
            Self {
                sync: false,
                ..Self::ALL
            },
        ]
    }

    /// Names of the disabled groups.
    pub fn disabled(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if !self.conflicts {
            names.push("conflicts");
        }
        if !self.daily_cap {
            names.push("daily cap");
        }
        if !self.sync {
            names.push("sync");
        }
        names
    }
}

impl Default for ConstraintToggles {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::fmt::Display for ConstraintToggles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let disabled = self.disabled();
        if disabled.is_empty() {
            f.write_str("all constraints")
        } else {
            write!(f, "without {}", disabled.join(", "))
        }
    }
}

/// The assignment variable of one (course, subject) exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamVar {
    pub course: CourseId,
    pub subject: SubjectId,
    pub var: IntVar,
}

/// Holds the engine and the variable maps while constraints are posted.
pub struct ModelBuilderContext<'a> {
    pub relations: &'a Relations,
    pub engine: Box<dyn ConstraintEngine>,
    pub max_exams_per_day: i64,
    pub toggles: ConstraintToggles,
    /// One entry per exam, ordered by course then subject.
    pub exams: Vec<ExamVar>,
    /// `day_indicators[exam][day]`, filled by the daily-load builder.
    pub day_indicators: Vec<Vec<BoolVar>>,
    pub objective: Option<IntVar>,
    exam_index: HashMap<(CourseId, SubjectId), usize>,
}

impl<'a> ModelBuilderContext<'a> {
    pub fn new(
        relations: &'a Relations,
        engine: Box<dyn ConstraintEngine>,
        max_exams_per_day: i64,
    ) -> Self {
        Self::new_with_toggles(relations, engine, max_exams_per_day, ConstraintToggles::ALL)
    }

    pub fn new_with_toggles(
        relations: &'a Relations,
        engine: Box<dyn ConstraintEngine>,
        max_exams_per_day: i64,
        toggles: ConstraintToggles,
    ) -> Self {
        Self {
            relations,
            engine,
            max_exams_per_day,
            toggles,
            exams: Vec::with_capacity(relations.exam_count()),
            day_indicators: Vec::new(),
            objective: None,
            exam_index: HashMap::with_capacity(relations.exam_count()),
        }
    }

    pub(crate) fn push_exam(&mut self, course: CourseId, subject: SubjectId, var: IntVar) {
        self.exam_index.insert((course, subject), self.exams.len());
        self.exams.push(ExamVar {
            course,
            subject,
            var,
        });
    }

    /// Position of the exam in [`ModelBuilderContext::exams`].
    pub fn exam_position(&self, course: CourseId, subject: SubjectId) -> Option<usize> {
        self.exam_index.get(&(course, subject)).copied()
    }

    pub fn exam_var(&self, course: CourseId, subject: SubjectId) -> Option<IntVar> {
        self.exam_position(course, subject)
            .map(|position| self.exams[position].var)
    }
}

/// Posts every enabled constraint group and the objective.
pub fn build_model_pipeline(ctx: &mut ModelBuilderContext<'_>) -> Result<(), ModelError> {
    add_exam_variables(ctx)?;
    if ctx.toggles.conflicts {
        add_conflict_constraints(ctx);
    }
    if ctx.toggles.daily_cap {
        add_daily_load_constraints(ctx);
    }
    if ctx.toggles.sync {
        add_sync_constraints(ctx)?;
    }
    add_makespan_objective(ctx);
    Ok(())
}
