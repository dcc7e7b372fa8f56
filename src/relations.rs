//! Normalized scheduling relations derived from the raw snapshots.
//!
//! Courses, subjects and students are interned into dense ids once; the model
//! builder only ever sees ids. Course ids follow the lexicographic order of the
//! course names, subject ids the order of first appearance in the rosters.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use tracing::{debug, warn};

use crate::error::RelationError;
use crate::input::RawInput;

/// Linear slot index, `day * slots_per_day + period`.
pub type Slot = usize;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

typed_id!(
    /// Dense id of a course cohort.
    CourseId
);
typed_id!(
    /// Dense id of a subject, shared by all courses.
    SubjectId
);
typed_id!(
    /// Dense id of a (course, student) pair.
    StudentId
);

#[derive(Debug, Clone, Default)]
struct Interner {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }
}

/// A course cohort after in-class exclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub name: String,
    /// Ascending slots with occupancy code 0.
    pub free_slots: Vec<Slot>,
    /// Subjects this course must schedule, ascending by id.
    pub subjects: Vec<SubjectId>,
    /// Subjects already examined in class, with the slots used.
    pub exams_in_class: BTreeMap<String, Vec<Slot>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub course: CourseId,
    pub name: String,
    /// Filtered subjects, ascending by id. May be empty.
    pub subjects: Vec<SubjectId>,
}

/// Scheduling relations for one run.
#[derive(Debug, Clone)]
pub struct Relations {
    days: Vec<String>,
    slots_per_day: usize,
    total_slots: usize,
    courses: Vec<Course>,
    course_ids: HashMap<String, CourseId>,
    subjects: Interner,
    students: Vec<Student>,
    courses_by_subject: Vec<Vec<CourseId>>,
    daily_slot_ranges: Vec<Range<Slot>>,
}

impl Relations {
    /// Derives the relations from the raw snapshots.
    ///
    /// Every course grid is checked against the reference course (the first
    /// course, first canonical day) before anything else is built.
    pub fn build(raw: &RawInput) -> Result<Self, RelationError> {
        let slots_per_day = validate_grids(raw)?;
        let total_slots = raw.days.len() * slots_per_day;

        let mut courses: Vec<Course> = Vec::with_capacity(raw.timetables.len());
        let mut course_ids = HashMap::with_capacity(raw.timetables.len());
        for (index, (name, grid)) in raw.timetables.iter().enumerate() {
            course_ids.insert(name.clone(), CourseId::new(index));
            courses.push(Course {
                name: name.clone(),
                free_slots: free_slots(grid, &raw.days, slots_per_day),
                subjects: Vec::new(),
                exams_in_class: BTreeMap::new(),
            });
        }

        // Union of the roster per course, before exclusion.
        let mut subjects = Interner::default();
        let mut by_course: Vec<BTreeSet<SubjectId>> = vec![BTreeSet::new(); courses.len()];
        let mut students = Vec::new();
        for (course_name, roster) in &raw.rosters {
            let course = *course_ids
                .get(course_name)
                .ok_or_else(|| RelationError::UnknownRosterCourse(course_name.clone()))?;
            for (student_name, wanted) in roster {
                let set: BTreeSet<SubjectId> = wanted
                    .iter()
                    .map(|subject| SubjectId(subjects.intern(subject)))
                    .collect();
                by_course[course.index()].extend(set.iter().copied());
                students.push(Student {
                    course,
                    name: student_name.clone(),
                    subjects: set.into_iter().collect(),
                });
            }
        }

        for (course_name, in_class) in &raw.exams_in_class {
            let Some(&course) = course_ids.get(course_name) else {
                warn!(
                    course = %course_name,
                    subjects = in_class.len(),
                    "in-class exams listed for a course without timetable, ignoring"
                );
                continue;
            };
            for (subject, slots) in in_class {
                if let Some(id) = subjects.get(subject) {
                    by_course[course.index()].remove(&SubjectId(id));
                }
                courses[course.index()]
                    .exams_in_class
                    .insert(subject.clone(), slots.clone());
            }
        }

        for student in &mut students {
            let allowed = &by_course[student.course.index()];
            student.subjects.retain(|subject| allowed.contains(subject));
        }

        let mut courses_by_subject = vec![Vec::new(); subjects.names.len()];
        for (course, set) in courses.iter_mut().zip(&by_course) {
            course.subjects = set.iter().copied().collect();
        }
        for (index, set) in by_course.iter().enumerate() {
            for subject in set {
                courses_by_subject[subject.index()].push(CourseId::new(index));
            }
        }

        let daily_slot_ranges = (0..raw.days.len())
            .map(|day| day * slots_per_day..(day + 1) * slots_per_day)
            .collect();

        let relations = Self {
            days: raw.days.clone(),
            slots_per_day,
            total_slots,
            courses,
            course_ids,
            subjects,
            students,
            courses_by_subject,
            daily_slot_ranges,
        };
        debug!(
            courses = relations.courses.len(),
            subjects = relations.subjects.names.len(),
            students = relations.students.len(),
            exams = relations.exam_count(),
            slots_per_day,
            total_slots,
            "built scheduling relations"
        );
        Ok(relations)
    }

    pub fn days(&self) -> &[String] {
        &self.days
    }

    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, id: CourseId) -> &Course {
        &self.courses[id.index()]
    }

    pub fn course_ids(&self) -> impl Iterator<Item = CourseId> + '_ {
        (0..self.courses.len()).map(CourseId::new)
    }

    pub fn course_id(&self, name: &str) -> Option<CourseId> {
        self.course_ids.get(name).copied()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.names.len()
    }

    pub fn subject_name(&self, id: SubjectId) -> &str {
        &self.subjects.names[id.index()]
    }

    pub fn subject_id(&self, name: &str) -> Option<SubjectId> {
        self.subjects.get(name).map(SubjectId)
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, id: StudentId) -> &Student {
        &self.students[id.index()]
    }

    /// Courses that must schedule `subject`, ascending.
    pub fn courses_by_subject(&self, subject: SubjectId) -> &[CourseId] {
        &self.courses_by_subject[subject.index()]
    }

    pub fn daily_slot_ranges(&self) -> &[Range<Slot>] {
        &self.daily_slot_ranges
    }

    /// Day index containing `slot`.
    pub fn day_of(&self, slot: Slot) -> usize {
        slot / self.slots_per_day.max(1)
    }

    /// Number of (course, subject) exams to place.
    pub fn exam_count(&self) -> usize {
        self.courses.iter().map(|course| course.subjects.len()).sum()
    }

    /// Free slots shared by two courses, ascending.
    pub fn common_free_slots(&self, a: CourseId, b: CourseId) -> Vec<Slot> {
        intersect_sorted(&self.course(a).free_slots, &self.course(b).free_slots)
    }
}

/// Checks every grid against the reference course and returns `slots_per_day`.
fn validate_grids(raw: &RawInput) -> Result<usize, RelationError> {
    let first_day = raw.days.first().ok_or(RelationError::NoDays)?;
    let (reference, grid) = raw
        .timetables
        .iter()
        .next()
        .ok_or(RelationError::NoCourses)?;
    let slots_per_day = grid
        .get(first_day)
        .ok_or_else(|| RelationError::MissingDay {
            course: reference.clone(),
            day: first_day.clone(),
        })?
        .len();

    for (course, grid) in &raw.timetables {
        for day in &raw.days {
            let row = grid.get(day).ok_or_else(|| RelationError::MissingDay {
                course: course.clone(),
                day: day.clone(),
            })?;
            if row.len() != slots_per_day {
                return Err(RelationError::InconsistentGrid {
                    course: course.clone(),
                    day: day.clone(),
                    expected: slots_per_day,
                    found: row.len(),
                });
            }
        }
    }
    Ok(slots_per_day)
}

fn free_slots(grid: &BTreeMap<String, Vec<u32>>, days: &[String], slots_per_day: usize) -> Vec<Slot> {
    let mut slots = Vec::new();
    for (day_index, day) in days.iter().enumerate() {
        let Some(row) = grid.get(day) else { continue };
        for (period, &code) in row.iter().enumerate() {
            if code == 0 {
                slots.push(day_index * slots_per_day + period);
            }
        }
    }
    slots
}

pub(crate) fn intersect_sorted(a: &[Slot], b: &[Slot]) -> Vec<Slot> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
