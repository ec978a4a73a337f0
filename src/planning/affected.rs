use std::collections::BTreeSet;

use tracing::debug;

use crate::planning::{AbsenceRecord, AbsentTeacher, PlanError, StaffingUnit};
use crate::timetable::{School, Weekday};

pub fn validate_absences(absences: &[AbsenceRecord], school: &School) -> Result<(), PlanError> {
    if absences.is_empty() {
        return Err(PlanError::invalid("at least one absent teacher is required"));
    }
    let mut seen = BTreeSet::new();
    for absence in absences {
        let id = absence.teacher_id.trim();
        if !school.roster.contains(id) {
            return Err(PlanError::invalid(format!("unknown teacher id: {id}")));
        }
        if !seen.insert(id) {
            return Err(PlanError::invalid(format!("teacher {id} is listed as absent twice")));
        }
    }
    Ok(())
}

pub fn resolve_staffing_units(
    absences: &[AbsenceRecord],
    school: &School,
    weekday: Weekday,
) -> Result<Vec<StaffingUnit>, PlanError> {
    validate_absences(absences, school)?;
    if !school.timetable.has_day(weekday) {
        return Err(PlanError::invalid(format!("{weekday} is not a teaching day")));
    }

    let mut units = Vec::new();
    for slot in school.timetable.slots_on(weekday) {
        let absent: Vec<AbsentTeacher> = slot
            .teacher_ids()
            .filter_map(|teacher_id| {
                absences
                    .iter()
                    .find(|a| a.teacher_id.trim() == teacher_id)
                    .map(|a| AbsentTeacher {
                        teacher_id: teacher_id.to_string(),
                        name: school
                            .roster
                            .by_id(teacher_id)
                            .map(|t| t.name.clone())
                            .unwrap_or_else(|| teacher_id.to_string()),
                        reason: a.reason_or_default().to_string(),
                    })
            })
            .collect();
        if absent.is_empty() {
            continue;
        }
        units.push(StaffingUnit {
            weekday,
            period: slot.period.clone(),
            class: slot.class.clone(),
            teaching_units: slot.teaching_units.clone(),
            absent,
        });
    }

    debug!(
        "{} staffing units affected by {} absences on {weekday}",
        units.len(),
        absences.len()
    );
    Ok(units)
}

pub fn describe_absences(absences: &[AbsenceRecord], school: &School) -> Vec<AbsentTeacher> {
    absences
        .iter()
        .map(|a| AbsentTeacher {
            teacher_id: a.teacher_id.trim().to_string(),
            name: school
                .roster
                .by_id(a.teacher_id.trim())
                .map(|t| t.name.clone())
                .unwrap_or_else(|| a.teacher_id.clone()),
            reason: a.reason_or_default().to_string(),
        })
        .collect()
}
