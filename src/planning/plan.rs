use serde::{Deserialize, Serialize};

use crate::planning::{
    Assignment, PlanError, ReportInfo, SubstituteChoice, JUSTIFICATION_MANUAL_CHANGE,
    JUSTIFICATION_MANUAL_ENTRY, MANUAL_SUBSTITUTE_ID,
};
use crate::timetable::{Period, Roster, School, Teacher, Weekday};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub info: ReportInfo,
    pub assignments: Vec<Assignment>,
}

impl Plan {
    pub fn new(info: ReportInfo, assignments: Vec<Assignment>) -> Self {
        Self { info, assignments }
    }

    pub fn get(&self, index: usize) -> Result<&Assignment, PlanError> {
        self.assignments
            .get(index)
            .ok_or(PlanError::UnknownAssignment(index))
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Assignment, PlanError> {
        self.assignments
            .get_mut(index)
            .ok_or(PlanError::UnknownAssignment(index))
    }

    /// Same-period double-booking is not re-checked.
    pub fn set_substitute(
        &mut self,
        index: usize,
        choice: SubstituteChoice,
        roster: &Roster,
    ) -> Result<&Assignment, PlanError> {
        let teacher = match &choice {
            SubstituteChoice::Teacher(id) => Some(
                roster
                    .by_id(id.trim())
                    .cloned()
                    .ok_or_else(|| PlanError::UnknownTeacher(id.clone()))?,
            ),
            SubstituteChoice::Manual => None,
        };
        let assignment = self.get_mut(index)?;
        match teacher {
            Some(teacher) => {
                assignment.substitute_teacher_id = teacher.id;
                assignment.substitute_teacher_name = teacher.name;
                assignment.justification = JUSTIFICATION_MANUAL_CHANGE.to_string();
            }
            None => {
                assignment.substitute_teacher_id = MANUAL_SUBSTITUTE_ID.to_string();
                assignment.substitute_teacher_name = String::new();
                assignment.justification = JUSTIFICATION_MANUAL_ENTRY.to_string();
            }
        }
        Ok(assignment)
    }

    pub fn set_manual_substitute_name(
        &mut self,
        index: usize,
        name: &str,
    ) -> Result<&Assignment, PlanError> {
        let assignment = self.get_mut(index)?;
        if !assignment.is_manual() {
            return Err(PlanError::invalid(format!(
                "row {index} has substitute {}; choose {MANUAL_SUBSTITUTE_ID} first",
                assignment.substitute_teacher_id
            )));
        }
        assignment.substitute_teacher_name = name.to_string();
        Ok(assignment)
    }

    pub fn list_available_substitutes(
        &self,
        school: &School,
        weekday: Weekday,
        period: &Period,
        excluding_index: Option<usize>,
    ) -> Vec<Teacher> {
        let taken: Vec<&str> = self
            .assignments
            .iter()
            .enumerate()
            .filter(|(i, a)| Some(*i) != excluding_index && &a.period == period)
            .filter_map(|(_, a)| a.substitute_teacher())
            .collect();

        school
            .roster
            .teachers()
            .iter()
            .filter(|t| !school.timetable.is_busy(&t.id, weekday, period))
            .filter(|t| !self.info.absences.iter().any(|a| a.teacher_id == t.id))
            .filter(|t| !taken.contains(&t.id.as_str()))
            .cloned()
            .collect()
    }

    pub fn available_for_row(&self, school: &School, index: usize) -> Result<Vec<Teacher>, PlanError> {
        let assignment = self.get(index)?;
        Ok(self.list_available_substitutes(
            school,
            assignment.weekday,
            &assignment.period,
            Some(index),
        ))
    }

    pub fn manual_rows(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_manual()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanReport {
    pub school_name: String,
    pub preparer_name: String,
    pub plan: Plan,
}
