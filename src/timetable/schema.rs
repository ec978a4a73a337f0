use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Teacher {
    pub id: String,
    pub name: String,
}

impl Teacher {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TeacherRef {
    pub id: String,
    pub name: String,
}

impl From<&Teacher> for TeacherRef {
    fn from(value: &Teacher) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn local_name(&self) -> &'static str {
        match self {
            Self::Monday => "ISNIN",
            Self::Tuesday => "SELASA",
            Self::Wednesday => "RABU",
            Self::Thursday => "KHAMIS",
            Self::Friday => "JUMAAT",
        }
    }

    pub fn from_date(date: NaiveDate) -> Option<Self> {
        match date.weekday() {
            chrono::Weekday::Mon => Some(Self::Monday),
            chrono::Weekday::Tue => Some(Self::Tuesday),
            chrono::Weekday::Wed => Some(Self::Wednesday),
            chrono::Weekday::Thu => Some(Self::Thursday),
            chrono::Weekday::Fri => Some(Self::Friday),
            chrono::Weekday::Sat | chrono::Weekday::Sun => None,
        }
    }
}

impl Display for Weekday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.local_name())
    }
}

#[derive(Debug, Error)]
#[error("unknown weekday: {0}")]
pub struct WeekdayParseError(pub String);

impl FromStr for Weekday {
    type Err = WeekdayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "isnin" | "monday" | "mon" => Ok(Self::Monday),
            "selasa" | "tuesday" | "tue" => Ok(Self::Tuesday),
            "rabu" | "wednesday" | "wed" => Ok(Self::Wednesday),
            "khamis" | "thursday" | "thu" => Ok(Self::Thursday),
            "jumaat" | "friday" | "fri" => Ok(Self::Friday),
            _ => Err(WeekdayParseError(s.to_string())),
        }
    }
}

/// Zero-padded labels such as `0720-0750`; lexical order is chronological.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Period(String);

impl Period {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Period {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeachingUnit {
    pub subject: String,
    #[serde(default)]
    pub teacher_id: Option<String>,
}

impl TeachingUnit {
    pub fn new(subject: impl Into<String>, teacher_id: impl Into<String>) -> Self {
        let teacher_id = teacher_id.into();
        Self {
            subject: subject.into(),
            teacher_id: if teacher_id.trim().is_empty() {
                None
            } else {
                Some(teacher_id)
            },
        }
    }

    pub fn taught_by(&self, teacher_id: &str) -> bool {
        self.teacher_id.as_deref() == Some(teacher_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimetableSlot {
    pub weekday: Weekday,
    pub period: Period,
    pub class: String,
    pub teaching_units: Vec<TeachingUnit>,
}

impl TimetableSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            weekday: self.weekday,
            period: self.period.clone(),
            class: self.class.clone(),
        }
    }

    pub fn is_joint(&self) -> bool {
        self.teaching_units.len() > 1
    }

    pub fn teacher_ids(&self) -> impl Iterator<Item = &str> {
        self.teaching_units
            .iter()
            .filter_map(|unit| unit.teacher_id.as_deref())
    }

    pub fn involves(&self, teacher_id: &str) -> bool {
        self.teaching_units.iter().any(|u| u.taught_by(teacher_id))
    }

    pub fn subject_label(&self) -> String {
        subject_label(&self.teaching_units)
    }
}

pub fn subject_label(units: &[TeachingUnit]) -> String {
    units
        .iter()
        .map(|u| u.subject.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub weekday: Weekday,
    pub period: Period,
    pub class: String,
}

impl Display for SlotKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.weekday, self.period, self.class)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Period, TeachingUnit, Weekday};

    #[test]
    fn maps_dates_to_teaching_days() {
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date");
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date");
        assert_eq!(Weekday::from_date(monday), Some(Weekday::Monday));
        assert_eq!(Weekday::from_date(saturday), None);
    }

    #[test]
    fn parses_local_and_english_weekday_names() {
        assert_eq!("isnin".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!(" JUMAAT ".parse::<Weekday>().unwrap(), Weekday::Friday);
        assert_eq!("Wednesday".parse::<Weekday>().unwrap(), Weekday::Wednesday);
        assert!("sabtu".parse::<Weekday>().is_err());
    }

    #[test]
    fn period_labels_sort_chronologically() {
        let mut periods = vec![
            Period::new("1010-1040"),
            Period::new("0720-0750"),
            Period::new("0950-1010"),
        ];
        periods.sort();
        assert_eq!(periods[0].as_str(), "0720-0750");
        assert_eq!(periods[2].as_str(), "1010-1040");
    }

    #[test]
    fn blank_teacher_ids_are_dropped() {
        let unit = TeachingUnit::new("PH", "  ");
        assert!(unit.teacher_id.is_none());
        assert!(!unit.taught_by(""));
    }
}
