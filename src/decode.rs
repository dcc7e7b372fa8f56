//! Turns a solved assignment into per-course slot buckets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::SolvedExams;
use crate::relations::{Relations, Slot};

/// The decoded exam timetable handed to the exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSchedule {
    pub days: Vec<String>,
    pub slots_per_day: usize,
    /// Latest slot used by any exam.
    pub latest_slot: Slot,
    /// Whether the engine proved `latest_slot` minimal.
    pub proven_optimal: bool,
    /// course → one bucket of subject names per slot.
    pub courses: BTreeMap<String, Vec<Vec<String>>>,
}

impl ExamSchedule {
    pub fn total_slots(&self) -> usize {
        self.days.len() * self.slots_per_day
    }

    pub fn course(&self, name: &str) -> Option<&[Vec<String>]> {
        self.courses.get(name).map(Vec::as_slice)
    }

    /// Slot of `subject`'s exam in `course`, if it is scheduled.
    pub fn slot_of(&self, course: &str, subject: &str) -> Option<Slot> {
        self.course(course)?
            .iter()
            .position(|bucket| bucket.iter().any(|s| s == subject))
    }

    /// Number of scheduled exams across all courses.
    pub fn exam_count(&self) -> usize {
        self.courses.values().flatten().map(Vec::len).sum()
    }
}

impl SolvedExams {
    /// Buckets every assignment under its course and slot.
    ///
    /// Every course gets `total_slots` buckets, even one with nothing to
    /// schedule. Several subjects may share a bucket.
    pub fn decode(self, relations: &Relations) -> ExamSchedule {
        let total_slots = relations.total_slots();
        let mut buckets: Vec<Vec<Vec<String>>> =
            vec![vec![Vec::new(); total_slots]; relations.courses().len()];
        for assignment in &self.assignments {
            buckets[assignment.course.index()][assignment.slot]
                .push(relations.subject_name(assignment.subject).to_string());
        }

        let courses = relations
            .courses()
            .iter()
            .zip(buckets)
            .map(|(course, slots)| (course.name.clone(), slots))
            .collect();

        ExamSchedule {
            days: relations.days().to_vec(),
            slots_per_day: relations.slots_per_day(),
            latest_slot: self.objective,
            proven_optimal: self.status == crate::engine::SolveStatus::Optimal,
            courses,
        }
    }
}
