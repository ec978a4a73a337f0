pub mod grid;
pub mod sample;
pub mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use schema::{
    subject_label, Period, SlotKey, Teacher, TeacherRef, TeachingUnit, TimetableSlot, Weekday,
    WeekdayParseError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roster {
    teachers: Vec<Teacher>,
}

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("duplicate teacher id in roster: {0}")]
    DuplicateTeacher(String),
    #[error("duplicate timetable slot: {0}")]
    DuplicateSlot(SlotKey),
    #[error("timetable slot {slot} references unknown teacher {teacher_id}")]
    UnknownTeacher { slot: SlotKey, teacher_id: String },
}

impl Roster {
    pub fn new(teachers: Vec<Teacher>) -> std::result::Result<Self, TimetableError> {
        let mut seen = BTreeSet::new();
        for teacher in &teachers {
            if !seen.insert(teacher.id.as_str()) {
                return Err(TimetableError::DuplicateTeacher(teacher.id.clone()));
            }
        }
        Ok(Self { teachers })
    }

    pub fn teachers(&self) -> &[Teacher] {
        &self.teachers
    }

    pub fn by_id(&self, id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id(id).is_some()
    }

    pub fn by_name(&self, name: &str) -> Option<&Teacher> {
        let wanted = name.trim();
        self.teachers
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(wanted))
    }

    pub fn len(&self) -> usize {
        self.teachers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timetable {
    slots: Vec<TimetableSlot>,
}

impl Timetable {
    pub fn new(slots: Vec<TimetableSlot>) -> std::result::Result<Self, TimetableError> {
        let mut seen = BTreeSet::new();
        for slot in &slots {
            let key = slot.key();
            if seen.contains(&key) {
                return Err(TimetableError::DuplicateSlot(key));
            }
            seen.insert(key);
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[TimetableSlot] {
        &self.slots
    }

    pub fn slots_on(&self, weekday: Weekday) -> impl Iterator<Item = &TimetableSlot> {
        self.slots.iter().filter(move |s| s.weekday == weekday)
    }

    pub fn has_day(&self, weekday: Weekday) -> bool {
        self.slots_on(weekday).next().is_some()
    }

    pub fn slot(&self, weekday: Weekday, period: &Period, class: &str) -> Option<&TimetableSlot> {
        self.slots
            .iter()
            .find(|s| s.weekday == weekday && &s.period == period && s.class == class)
    }

    pub fn busy_teachers(&self, weekday: Weekday, period: &Period) -> BTreeSet<&str> {
        self.slots_on(weekday)
            .filter(|s| &s.period == period)
            .flat_map(|s| s.teacher_ids())
            .collect()
    }

    pub fn is_busy(&self, teacher_id: &str, weekday: Weekday, period: &Period) -> bool {
        self.slots_on(weekday)
            .any(|s| &s.period == period && s.involves(teacher_id))
    }

    pub fn load_on(&self, teacher_id: &str, weekday: Weekday) -> usize {
        self.slots_on(weekday)
            .filter(|s| s.involves(teacher_id))
            .count()
    }

    pub fn teaches_subject(&self, teacher_id: &str, subject: &str) -> bool {
        self.slots.iter().any(|s| {
            s.teaching_units
                .iter()
                .any(|u| u.taught_by(teacher_id) && u.subject.eq_ignore_ascii_case(subject))
        })
    }

    pub fn teaches_class(&self, teacher_id: &str, class: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.class == class && s.involves(teacher_id))
    }

    pub fn periods_on(&self, weekday: Weekday) -> Vec<Period> {
        self.slots_on(weekday)
            .map(|s| s.period.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn by_day(&self) -> BTreeMap<Weekday, Vec<&TimetableSlot>> {
        let mut out: BTreeMap<Weekday, Vec<&TimetableSlot>> = BTreeMap::new();
        for slot in &self.slots {
            out.entry(slot.weekday).or_default().push(slot);
        }
        for slots in out.values_mut() {
            slots.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.class.cmp(&b.class)));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct School {
    pub name: String,
    pub periods: Vec<Period>,
    pub roster: Roster,
    pub timetable: Timetable,
}

impl School {
    pub fn new(
        name: impl Into<String>,
        periods: Vec<Period>,
        roster: Roster,
        timetable: Timetable,
    ) -> std::result::Result<Self, TimetableError> {
        for slot in timetable.slots() {
            for teacher_id in slot.teacher_ids() {
                if !roster.contains(teacher_id) {
                    return Err(TimetableError::UnknownTeacher {
                        slot: slot.key(),
                        teacher_id: teacher_id.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            name: name.into(),
            periods,
            roster,
            timetable,
        })
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("failed reading timetable: {}", path.display()))?;
                grid::parse_school(&data)
                    .with_context(|| format!("failed parsing timetable: {}", path.display()))
            }
            None => sample::sample_school(),
        }
    }
}
