pub mod csv;
pub mod json;
pub mod table;

use chrono::{Datelike, NaiveDate};

use crate::planning::Assignment;

const MONTHS: [&str; 12] = [
    "Januari", "Februari", "Mac", "April", "Mei", "Jun", "Julai", "Ogos", "September",
    "Oktober", "November", "Disember",
];

pub fn format_report_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

pub fn substitute_label(assignment: &Assignment) -> String {
    if assignment.is_undecided() {
        "(Belum ditentukan)".to_string()
    } else if assignment.is_manual() {
        if assignment.substitute_teacher_name.trim().is_empty() {
            "Lain-lain (belum diisi)".to_string()
        } else {
            format!("Lain-lain: {}", assignment.substitute_teacher_name)
        }
    } else {
        assignment.substitute_teacher_name.clone()
    }
}

pub fn absent_label(assignment: &Assignment) -> String {
    if assignment.absent_teachers.is_empty() {
        return "Tiada".to_string();
    }
    assignment
        .absent_teachers
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
