//! Daily indicators and the per-student daily exam cap.

use tracing::debug;

use super::model_context::ModelBuilderContext;
use crate::engine::BoolVar;

/// Links every exam to one boolean per day (`b <=> start <= slot < end`) and
/// caps, per student and day, how many of the student's indicators are true.
pub fn add_daily_load_constraints(ctx: &mut ModelBuilderContext<'_>) {
    let relations = ctx.relations;
    let ranges = relations.daily_slot_ranges();

    let mut indicators = Vec::with_capacity(ctx.exams.len());
    for exam in &ctx.exams {
        let per_day: Vec<BoolVar> = ranges
            .iter()
            .map(|range| {
                ctx.engine
                    .new_range_indicator(exam.var, range.start as i64..range.end as i64)
            })
            .collect();
        indicators.push(per_day);
    }
    ctx.day_indicators = indicators;

    let mut posted = 0usize;
    for student in relations.students() {
        // A student with no more exams than the cap can't break it.
        if student.subjects.len() as i64 <= ctx.max_exams_per_day {
            continue;
        }
        let positions: Vec<usize> = student
            .subjects
            .iter()
            .filter_map(|&subject| ctx.exam_position(student.course, subject))
            .collect();
        for day in 0..ranges.len() {
            let literals: Vec<BoolVar> = positions
                .iter()
                .map(|&position| ctx.day_indicators[position][day])
                .collect();
            ctx.engine.add_at_most(&literals, ctx.max_exams_per_day);
            posted += 1;
        }
    }
    debug!(
        indicators = ctx.exams.len() * ranges.len(),
        caps = posted,
        "daily load constraints posted"
    );
}
