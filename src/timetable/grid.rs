use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::timetable::{Period, Roster, School, Teacher, TeachingUnit, Timetable, TimetableSlot, Weekday};

pub const DEFAULT_NON_TEACHING_CODES: [&str; 6] = ["PH", "R", "H", "E", "A", "T"];

#[derive(Debug, Deserialize)]
struct GridFile {
    name: String,
    periods: Vec<String>,
    #[serde(default = "default_non_teaching_codes")]
    non_teaching_codes: Vec<String>,
    teachers: Vec<Teacher>,
    #[serde(default)]
    days: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CellError {
    #[error("malformed timetable cell `{0}`, expected SUBJECT/TEACHER")]
    Malformed(String),
}

pub fn parse_school(data: &str) -> Result<School> {
    let grid: GridFile = toml::from_str(data).context("invalid timetable grid")?;
    let periods: Vec<Period> = grid.periods.iter().map(|p| Period::new(p.as_str())).collect();

    let mut slots = Vec::new();
    for (day_name, classes) in &grid.days {
        let weekday = Weekday::from_str(day_name)?;
        for (class, cells) in classes {
            if cells.len() > periods.len() {
                return Err(anyhow!(
                    "{weekday} {class}: {} cells but only {} periods",
                    cells.len(),
                    periods.len()
                ));
            }
            for (cell, period) in cells.iter().zip(&periods) {
                let units = parse_cell(cell, &grid.non_teaching_codes)
                    .with_context(|| format!("{weekday} {class} {period}"))?;
                if let Some(teaching_units) = units {
                    slots.push(TimetableSlot {
                        weekday,
                        period: period.clone(),
                        class: class.clone(),
                        teaching_units,
                    });
                }
            }
        }
    }

    let roster = Roster::new(grid.teachers)?;
    let timetable = Timetable::new(slots)?;
    Ok(School::new(grid.name, periods, roster, timetable)?)
}

/// Parses one grid cell. `Ok(None)` means the period needs no teacher.
pub fn parse_cell(
    cell: &str,
    non_teaching_codes: &[String],
) -> std::result::Result<Option<Vec<TeachingUnit>>, CellError> {
    let trimmed = cell.trim();
    if trimmed.is_empty()
        || non_teaching_codes
            .iter()
            .any(|code| code.eq_ignore_ascii_case(trimmed))
    {
        return Ok(None);
    }

    let mut units = Vec::new();
    for piece in trimmed.split_whitespace() {
        let Some((subject, teacher)) = piece.split_once('/') else {
            return Err(CellError::Malformed(trimmed.to_string()));
        };
        if subject.is_empty() || teacher.is_empty() {
            return Err(CellError::Malformed(trimmed.to_string()));
        }
        units.push(TeachingUnit::new(subject, teacher));
    }
    Ok(Some(units))
}

fn default_non_teaching_codes() -> Vec<String> {
    DEFAULT_NON_TEACHING_CODES
        .iter()
        .map(|c| c.to_string())
        .collect()
}
