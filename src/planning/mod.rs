pub mod affected;
pub mod conflicts;
pub mod error;
pub mod plan;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::timetable::{subject_label, Period, SlotKey, TeacherRef, TeachingUnit, Weekday};

pub use error::PlanError;

/// Substitute id meaning "a person must decide and type a name".
pub const MANUAL_SUBSTITUTE_ID: &str = "LAIN_LAIN";

pub const DEFAULT_ABSENCE_REASON: &str = "Tidak dinyatakan";

pub const JUSTIFICATION_CONFLICT_REASSIGNED: &str = "Diubah oleh sistem untuk elak pertindihan.";
pub const JUSTIFICATION_NO_FREE_TEACHER: &str = "Tiada guru kelapangan ditemui sistem.";
pub const JUSTIFICATION_INVALID_PROPOSAL: &str =
    "Cadangan tidak sah, perlu ditentukan secara manual.";
pub const JUSTIFICATION_MANUAL_CHANGE: &str = "Diubah secara manual oleh pengguna.";
pub const JUSTIFICATION_MANUAL_ENTRY: &str = "Ditentukan secara manual.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbsenceRecord {
    pub teacher_id: String,
    #[serde(default)]
    pub reason: String,
}

impl AbsenceRecord {
    pub fn new(teacher_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            reason: reason.into(),
        }
    }

    pub fn reason_or_default(&self) -> &str {
        let reason = self.reason.trim();
        if reason.is_empty() {
            DEFAULT_ABSENCE_REASON
        } else {
            reason
        }
    }
}

impl FromStr for AbsenceRecord {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, reason) = match s.split_once(':') {
            Some((id, reason)) => (id.trim(), reason.trim()),
            None => (s.trim(), ""),
        };
        if id.is_empty() {
            return Err(PlanError::invalid(format!("missing teacher id in `{s}`")));
        }
        Ok(Self::new(id, reason))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbsentTeacher {
    pub teacher_id: String,
    pub name: String,
    pub reason: String,
}

impl AbsentTeacher {
    pub fn to_ref(&self) -> TeacherRef {
        TeacherRef {
            id: self.teacher_id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffingUnit {
    pub weekday: Weekday,
    pub period: Period,
    pub class: String,
    pub teaching_units: Vec<TeachingUnit>,
    pub absent: Vec<AbsentTeacher>,
}

impl StaffingUnit {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            weekday: self.weekday,
            period: self.period.clone(),
            class: self.class.clone(),
        }
    }

    pub fn subject(&self) -> String {
        subject_label(&self.teaching_units)
    }

    pub fn is_joint(&self) -> bool {
        self.teaching_units.len() > 1
    }

    pub fn absent_refs(&self) -> Vec<TeacherRef> {
        self.absent.iter().map(AbsentTeacher::to_ref).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub weekday: Weekday,
    pub period: Period,
    pub class: String,
    pub subject: String,
    pub absent_teachers: Vec<TeacherRef>,
    pub substitute_teacher_id: String,
    pub substitute_teacher_name: String,
    pub justification: String,
}

impl Assignment {
    pub fn for_unit(
        unit: &StaffingUnit,
        substitute_teacher_id: impl Into<String>,
        substitute_teacher_name: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            weekday: unit.weekday,
            period: unit.period.clone(),
            class: unit.class.clone(),
            subject: unit.subject(),
            absent_teachers: unit.absent_refs(),
            substitute_teacher_id: substitute_teacher_id.into(),
            substitute_teacher_name: substitute_teacher_name.into(),
            justification: justification.into(),
        }
    }

    pub fn manual_placeholder(unit: &StaffingUnit, justification: &str) -> Self {
        Self::for_unit(unit, MANUAL_SUBSTITUTE_ID, "", justification)
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            weekday: self.weekday,
            period: self.period.clone(),
            class: self.class.clone(),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.substitute_teacher_id == MANUAL_SUBSTITUTE_ID
    }

    pub fn is_undecided(&self) -> bool {
        self.substitute_teacher_id.trim().is_empty()
    }

    pub fn substitute_teacher(&self) -> Option<&str> {
        if self.is_manual() || self.is_undecided() {
            None
        } else {
            Some(self.substitute_teacher_id.as_str())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstituteChoice {
    Teacher(String),
    Manual,
}

impl FromStr for SubstituteChoice {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PlanError::invalid("substitute must not be empty"));
        }
        let normalized = trimmed.to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "lain_lain" | "manual" => Ok(Self::Manual),
            _ => Ok(Self::Teacher(trimmed.to_string())),
        }
    }
}

impl Display for SubstituteChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Teacher(id) => write!(f, "{id}"),
            Self::Manual => write!(f, "{MANUAL_SUBSTITUTE_ID}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportInfo {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub absences: Vec<AbsentTeacher>,
}
