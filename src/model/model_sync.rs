//! Cross-course synchronization of shared subjects.

use tracing::debug;

use super::model_context::ModelBuilderContext;
use crate::error::ModelError;
use crate::relations::{CourseId, SubjectId, intersect_sorted};

/// For every subject shared by several courses, forces the same slot on each
/// pair of courses that have a free slot in common. Pairs without one stay
/// independent.
///
/// Equalities chain transitively, so each connected group of courses must
/// also share one free slot across all its members; a group that doesn't is
/// rejected before any search.
pub fn add_sync_constraints(ctx: &mut ModelBuilderContext<'_>) -> Result<(), ModelError> {
    let relations = ctx.relations;
    let mut posted = 0usize;

    for index in 0..relations.subject_count() {
        let subject = SubjectId::new(index);
        let courses = relations.courses_by_subject(subject);
        if courses.len() < 2 {
            continue;
        }

        let mut linked = vec![Vec::new(); courses.len()];
        for i in 0..courses.len() {
            for j in i + 1..courses.len() {
                if relations.common_free_slots(courses[i], courses[j]).is_empty() {
                    continue;
                }
                let (Some(a), Some(b)) = (
                    ctx.exam_var(courses[i], subject),
                    ctx.exam_var(courses[j], subject),
                ) else {
                    continue;
                };
                ctx.engine.add_equal(a, b);
                linked[i].push(j);
                linked[j].push(i);
                posted += 1;
            }
        }

        for group in components(&linked) {
            if group.len() < 2 {
                continue;
            }
            let members: Vec<CourseId> = group.iter().map(|&i| courses[i]).collect();
            let mut common = relations.course(members[0]).free_slots.clone();
            for &course in &members[1..] {
                common = intersect_sorted(&common, &relations.course(course).free_slots);
            }
            if common.is_empty() {
                return Err(ModelError::IncompatibleSync {
                    subject: relations.subject_name(subject).to_string(),
                    courses: members
                        .iter()
                        .map(|&course| relations.course(course).name.clone())
                        .collect(),
                });
            }
        }
    }

    debug!(equalities = posted, "sync constraints posted");
    Ok(())
}

/// Connected components of an undirected adjacency list.
fn components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; adjacency.len()];
    let mut groups = Vec::new();
    for start in 0..adjacency.len() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut group = vec![start];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    group.push(next);
                    stack.push(next);
                }
            }
        }
        group.sort_unstable();
        groups.push(group);
    }
    groups
}
