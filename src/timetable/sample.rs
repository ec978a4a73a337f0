use anyhow::Result;

use crate::timetable::grid::parse_school;
use crate::timetable::School;

pub const SAMPLE_SCHOOL_GRID: &str = include_str!("../../demos/school.toml");

pub fn sample_school() -> Result<School> {
    parse_school(SAMPLE_SCHOOL_GRID)
}
