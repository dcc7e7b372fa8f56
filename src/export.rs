//! Writing the decoded schedule out as JSON and per-course spreadsheets.

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use tracing::{debug, info};

use crate::decode::ExamSchedule;
use crate::error::ExportError;
use crate::input::RawInput;
use crate::relations::{Course, Relations, Slot};

const SHEET_NAME: &str = "grade";
const HEADER_COLOR: u32 = 0xD9D9D9;

/// Writes `course → [[subject]]` as pretty JSON.
pub fn write_json(schedule: &ExamSchedule, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(&schedule.courses)?;
    fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), courses = schedule.courses.len(), "schedule written");
    Ok(())
}

/// Writes one `<course>.xlsx` grid per course into `dir`, creating it if
/// needed, and returns the paths written.
///
/// Cells show `1(subject)` for an in-class exam, the scheduled subjects
/// joined by ` | `, or the raw occupancy as 0 (free) / 1 (busy).
pub fn export_workbooks(
    relations: &Relations,
    raw: &RawInput,
    schedule: &ExamSchedule,
    dir: impl AsRef<Path>,
    time_labels: &[String],
) -> Result<Vec<PathBuf>, ExportError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(relations.courses().len());
    for course in relations.courses() {
        let path = dir.join(format!("{}.xlsx", course.name));
        write_course_workbook(relations, raw, schedule, course, time_labels, &path).map_err(
            |source| ExportError::Xlsx {
                course: course.name.clone(),
                source,
            },
        )?;
        debug!(course = %course.name, path = %path.display(), "workbook written");
        written.push(path);
    }
    info!(dir = %dir.display(), workbooks = written.len(), "spreadsheets exported");
    Ok(written)
}

/// What a single grid cell shows.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cell {
    Text(String),
    Occupancy(u32),
}

fn cell_content(
    raw: &RawInput,
    schedule: &ExamSchedule,
    course: &Course,
    day: &str,
    period: usize,
    slot: Slot,
) -> Cell {
    if let Some((subject, _)) = course
        .exams_in_class
        .iter()
        .find(|(_, slots)| slots.contains(&slot))
    {
        return Cell::Text(format!("1({subject})"));
    }

    let scheduled = schedule
        .course(&course.name)
        .and_then(|buckets| buckets.get(slot))
        .filter(|bucket| !bucket.is_empty());
    if let Some(bucket) = scheduled {
        return Cell::Text(bucket.join(" | "));
    }

    let code = raw
        .timetables
        .get(&course.name)
        .and_then(|grid| grid.get(day))
        .and_then(|row| row.get(period))
        .copied()
        .unwrap_or(0);
    Cell::Occupancy(u32::from(code != 0))
}

fn write_course_workbook(
    relations: &Relations,
    raw: &RawInput,
    schedule: &ExamSchedule,
    course: &Course,
    time_labels: &[String],
    path: &Path,
) -> Result<(), XlsxError> {
    let header = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::RGB(HEADER_COLOR));
    let day_header = header.clone().set_bold();
    let text = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_text_wrap();
    let number = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_num_format("0");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let days = relations.days();
    sheet.set_column_width(0, 15)?;
    for col in 1..=days.len() {
        sheet.set_column_width(col as u16, 22)?;
    }
    sheet.set_row_height(0, 25)?;

    sheet.write_string(0, 0, "")?;
    for (index, day) in days.iter().enumerate() {
        sheet.write_string_with_format(0, index as u16 + 1, capitalize(day), &day_header)?;
    }
    for (index, label) in time_labels.iter().enumerate() {
        sheet.write_string_with_format(index as u32 + 1, 0, label, &header)?;
    }

    let slots_per_day = relations.slots_per_day();
    for (day_index, day) in days.iter().enumerate() {
        for period in 0..slots_per_day {
            let row = period as u32 + 1;
            let col = day_index as u16 + 1;
            let slot = day_index * slots_per_day + period;
            match cell_content(raw, schedule, course, day, period, slot) {
                Cell::Text(value) => {
                    sheet.write_string_with_format(row, col, value, &text)?;
                }
                Cell::Occupancy(flag) => {
                    sheet.write_number_with_format(row, col, flag, &number)?;
                }
            }
        }
    }

    workbook.save(path)
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
