//! Exam variables, per-student conflicts and the makespan objective.

use tracing::debug;

use super::model_context::ModelBuilderContext;
use crate::error::ModelError;

/// One variable per (course, subject), domain = the course's free slots.
pub fn add_exam_variables(ctx: &mut ModelBuilderContext<'_>) -> Result<(), ModelError> {
    let relations = ctx.relations;
    for course_id in relations.course_ids() {
        let course = relations.course(course_id);
        if course.subjects.is_empty() {
            continue;
        }
        if course.free_slots.is_empty() {
            return Err(ModelError::EmptyDomain {
                course: course.name.clone(),
                subjects: course.subjects.len(),
            });
        }
        let domain: Vec<i64> = course.free_slots.iter().map(|&slot| slot as i64).collect();
        for &subject in &course.subjects {
            let var = ctx.engine.new_int_var(&domain);
            ctx.push_exam(course_id, subject, var);
        }
    }
    debug!(exams = ctx.exams.len(), "exam variables created");
    Ok(())
}

/// A student never sits two exams in the same slot.
pub fn add_conflict_constraints(ctx: &mut ModelBuilderContext<'_>) {
    let relations = ctx.relations;
    let mut posted = 0usize;
    for student in relations.students() {
        let vars: Vec<_> = student
            .subjects
            .iter()
            .filter_map(|&subject| ctx.exam_var(student.course, subject))
            .collect();
        for (i, &a) in vars.iter().enumerate() {
            for &b in &vars[i + 1..] {
                ctx.engine.add_different(a, b);
                posted += 1;
            }
        }
    }
    debug!(disequalities = posted, "conflict constraints posted");
}

/// Minimize the latest slot used by any exam.
pub fn add_makespan_objective(ctx: &mut ModelBuilderContext<'_>) {
    let vars: Vec<_> = ctx.exams.iter().map(|exam| exam.var).collect();
    let latest = ctx.engine.new_max_var(&vars);
    ctx.engine.minimize(latest);
    ctx.objective = Some(latest);
}
