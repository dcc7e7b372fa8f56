//! Independent re-check of a decoded schedule.
//!
//! Works on the decoded names rather than on engine values, so it also
//! catches decoding mistakes.

use std::collections::HashMap;
use std::fmt;

use crate::decode::ExamSchedule;
use crate::relations::{CourseId, Relations, Slot, SubjectId};

/// One broken scheduling rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DoubleBooked {
        course: String,
        student: String,
        slot: Slot,
        subjects: Vec<String>,
    },
    DailyCapExceeded {
        course: String,
        student: String,
        day: String,
        exams: usize,
    },
    Unsynchronized {
        subject: String,
        courses: (String, String),
        slots: (Slot, Slot),
    },
    NotFree {
        course: String,
        subject: String,
        slot: Slot,
    },
    Missing {
        course: String,
        subject: String,
    },
    Duplicated {
        course: String,
        subject: String,
        slots: Vec<Slot>,
    },
    Unexpected {
        course: String,
        subject: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleBooked {
                course,
                student,
                slot,
                subjects,
            } => write!(
                f,
                "{course}/{student} has {} exams in slot {slot}: {}",
                subjects.len(),
                subjects.join(", ")
            ),
            Self::DailyCapExceeded {
                course,
                student,
                day,
                exams,
            } => write!(f, "{course}/{student} has {exams} exams on {day}"),
            Self::Unsynchronized {
                subject,
                courses,
                slots,
            } => write!(
                f,
                "{subject} is in slot {} for {} but slot {} for {}",
                slots.0, courses.0, slots.1, courses.1
            ),
            Self::NotFree {
                course,
                subject,
                slot,
            } => write!(f, "{course}/{subject} placed in non-free slot {slot}"),
            Self::Missing { course, subject } => write!(f, "{course}/{subject} is not scheduled"),
            Self::Duplicated {
                course,
                subject,
                slots,
            } => write!(f, "{course}/{subject} is scheduled in slots {slots:?}"),
            Self::Unexpected { course, subject } => {
                write!(f, "{course}/{subject} is scheduled but not required")
            }
        }
    }
}

/// Checks `schedule` against every scheduling rule and returns all
/// violations found, empty for a valid schedule.
pub fn verify_schedule(
    relations: &Relations,
    schedule: &ExamSchedule,
    max_exams_per_day: i64,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let placed = placements(relations, schedule, &mut violations);

    for student in relations.students() {
        let course_name = &relations.course(student.course).name;
        let mut by_slot: HashMap<Slot, Vec<SubjectId>> = HashMap::new();
        let mut by_day = vec![0usize; relations.days().len()];
        for &subject in &student.subjects {
            let Some(&slot) = placed.get(&(student.course, subject)) else {
                continue;
            };
            by_slot.entry(slot).or_default().push(subject);
            if let Some(count) = by_day.get_mut(relations.day_of(slot)) {
                *count += 1;
            }
        }

        let mut clashes: Vec<_> = by_slot.into_iter().filter(|(_, s)| s.len() > 1).collect();
        clashes.sort_unstable();
        for (slot, subjects) in clashes {
            violations.push(Violation::DoubleBooked {
                course: course_name.clone(),
                student: student.name.clone(),
                slot,
                subjects: subjects
                    .iter()
                    .map(|&s| relations.subject_name(s).to_string())
                    .collect(),
            });
        }
        for (day, &exams) in by_day.iter().enumerate() {
            if exams as i64 > max_exams_per_day {
                violations.push(Violation::DailyCapExceeded {
                    course: course_name.clone(),
                    student: student.name.clone(),
                    day: relations.days()[day].clone(),
                    exams,
                });
            }
        }
    }

    for index in 0..relations.subject_count() {
        let subject = SubjectId::new(index);
        let courses = relations.courses_by_subject(subject);
        for (i, &a) in courses.iter().enumerate() {
            for &b in &courses[i + 1..] {
                if relations.common_free_slots(a, b).is_empty() {
                    continue;
                }
                let (Some(&slot_a), Some(&slot_b)) =
                    (placed.get(&(a, subject)), placed.get(&(b, subject)))
                else {
                    continue;
                };
                if slot_a != slot_b {
                    violations.push(Violation::Unsynchronized {
                        subject: relations.subject_name(subject).to_string(),
                        courses: (
                            relations.course(a).name.clone(),
                            relations.course(b).name.clone(),
                        ),
                        slots: (slot_a, slot_b),
                    });
                }
            }
        }
    }

    violations
}

/// Resolves the slot of every required exam, reporting exams that are
/// missing, duplicated, unexpected or outside the course's free slots.
fn placements(
    relations: &Relations,
    schedule: &ExamSchedule,
    violations: &mut Vec<Violation>,
) -> HashMap<(CourseId, SubjectId), Slot> {
    let mut placed = HashMap::with_capacity(relations.exam_count());

    for (index, course) in relations.courses().iter().enumerate() {
        let course_id = CourseId::new(index);
        let mut seen: HashMap<&str, Vec<Slot>> = HashMap::new();
        if let Some(buckets) = schedule.course(&course.name) {
            for (slot, bucket) in buckets.iter().enumerate() {
                for subject in bucket {
                    seen.entry(subject.as_str()).or_default().push(slot);
                }
            }
        }

        for &subject in &course.subjects {
            let name = relations.subject_name(subject);
            match seen.remove(name).as_deref() {
                None | Some([]) => violations.push(Violation::Missing {
                    course: course.name.clone(),
                    subject: name.to_string(),
                }),
                Some(&[slot]) => {
                    if course.free_slots.binary_search(&slot).is_err() {
                        violations.push(Violation::NotFree {
                            course: course.name.clone(),
                            subject: name.to_string(),
                            slot,
                        });
                    }
                    placed.insert((course_id, subject), slot);
                }
                Some(slots) => violations.push(Violation::Duplicated {
                    course: course.name.clone(),
                    subject: name.to_string(),
                    slots: slots.to_vec(),
                }),
            }
        }

        let mut extra: Vec<&str> = seen.into_keys().collect();
        extra.sort_unstable();
        for subject in extra {
            violations.push(Violation::Unexpected {
                course: course.name.clone(),
                subject: subject.to_string(),
            });
        }
    }
    placed
}
