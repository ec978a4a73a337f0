use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::planning::{
    AbsenceRecord, Assignment, PlanError, StaffingUnit, JUSTIFICATION_CONFLICT_REASSIGNED,
    JUSTIFICATION_INVALID_PROPOSAL, JUSTIFICATION_NO_FREE_TEACHER, MANUAL_SUBSTITUTE_ID,
};
use crate::recommender::RawProposal;
use crate::timetable::{Period, School, Weekday};

/// Turns raw recommender proposals into a conflict-free assignment list.
pub fn resolve_conflicts(
    proposals: Vec<RawProposal>,
    units: &[StaffingUnit],
    school: &School,
    absences: &[AbsenceRecord],
) -> Result<Vec<Assignment>, PlanError> {
    let mut attributed = attribute(proposals, units)?;
    attributed.sort_by(|a, b| {
        let (ua, ub) = (&units[a.0], &units[b.0]);
        ua.period.cmp(&ub.period).then_with(|| ua.class.cmp(&ub.class))
    });

    let absent: BTreeSet<&str> = absences.iter().map(|a| a.teacher_id.trim()).collect();
    let mut claimed: BTreeMap<Period, BTreeSet<String>> = BTreeMap::new();
    let mut decided: Vec<Option<Assignment>> = vec![None; units.len()];

    for (index, proposal) in attributed {
        if decided[index].is_some() {
            debug!("dropping duplicate proposal for {}", units[index].key());
            continue;
        }
        let unit = &units[index];
        let claimed_now = claimed.entry(unit.period.clone()).or_default();
        let assignment = decide(&proposal, unit, school, &absent, claimed_now);
        decided[index] = Some(assignment);
    }

    let mut out: Vec<Assignment> = decided
        .into_iter()
        .zip(units)
        .map(|(assignment, unit)| {
            assignment.unwrap_or_else(|| {
                warn!("no proposal received for {}", unit.key());
                Assignment::manual_placeholder(unit, JUSTIFICATION_INVALID_PROPOSAL)
            })
        })
        .collect();
    out.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.class.cmp(&b.class)));
    Ok(out)
}

fn attribute(
    proposals: Vec<RawProposal>,
    units: &[StaffingUnit],
) -> Result<Vec<(usize, RawProposal)>, PlanError> {
    let mut out = Vec::with_capacity(proposals.len());
    for proposal in proposals {
        let (Some(period), Some(class)) = (proposal.period.as_deref(), proposal.class.as_deref())
        else {
            warn!("dropping proposal without period or class");
            continue;
        };
        let period = Period::new(period.trim());
        let class = class.trim();
        let Some(index) = units
            .iter()
            .position(|u| u.period == period && u.class == class)
        else {
            return Err(PlanError::contract(format!(
                "proposal for {period} {class} does not match any affected period"
            )));
        };
        out.push((index, proposal));
    }
    Ok(out)
}

fn decide(
    proposal: &RawProposal,
    unit: &StaffingUnit,
    school: &School,
    absent: &BTreeSet<&str>,
    claimed: &mut BTreeSet<String>,
) -> Assignment {
    if let Some(missing) = missing_field(proposal, unit) {
        warn!("invalid proposal for {}: {missing}", unit.key());
        return Assignment::manual_placeholder(unit, JUSTIFICATION_INVALID_PROPOSAL);
    }

    let justification = proposal.justification.clone().unwrap_or_default();
    let id = proposal
        .substitute_teacher_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    let name = proposal
        .substitute_teacher_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    if id == MANUAL_SUBSTITUTE_ID {
        return Assignment::for_unit(unit, MANUAL_SUBSTITUTE_ID, name, justification);
    }

    if let Some(defect) = defect(id, name, unit, school, absent) {
        warn!("invalid proposal for {}: {defect}", unit.key());
        return Assignment::manual_placeholder(unit, JUSTIFICATION_INVALID_PROPOSAL);
    }

    if claimed.insert(id.to_string()) {
        return Assignment::for_unit(unit, id, name, justification);
    }

    let alternative = school.roster.teachers().iter().find(|t| {
        !absent.contains(t.id.as_str())
            && !claimed.contains(&t.id)
            && !school.timetable.is_busy(&t.id, unit.weekday, &unit.period)
    });
    match alternative {
        Some(teacher) => {
            debug!(
                "{id} already covers another class at {}; reassigning {} to {}",
                unit.period, unit.class, teacher.id
            );
            claimed.insert(teacher.id.clone());
            Assignment::for_unit(
                unit,
                teacher.id.as_str(),
                teacher.name.as_str(),
                JUSTIFICATION_CONFLICT_REASSIGNED,
            )
        }
        None => Assignment::for_unit(
            unit,
            MANUAL_SUBSTITUTE_ID,
            "",
            JUSTIFICATION_NO_FREE_TEACHER,
        ),
    }
}

fn missing_field(proposal: &RawProposal, unit: &StaffingUnit) -> Option<String> {
    let filled = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

    match proposal.day.as_deref().map(str::trim) {
        None | Some("") => return Some("missing day".to_string()),
        Some(day) if day.parse::<Weekday>().ok() != Some(unit.weekday) => {
            return Some(format!("day {day} does not match {}", unit.weekday));
        }
        Some(_) => {}
    }
    if !filled(&proposal.subject) {
        return Some("missing subject".to_string());
    }
    if proposal.absent_teachers.is_none() {
        return Some("missing absent teachers".to_string());
    }
    if !filled(&proposal.substitute_teacher_id) {
        return Some("missing substitute id".to_string());
    }
    if !filled(&proposal.justification) {
        return Some("missing justification".to_string());
    }
    None
}

fn defect(
    id: &str,
    name: &str,
    unit: &StaffingUnit,
    school: &School,
    absent: &BTreeSet<&str>,
) -> Option<String> {
    if name.is_empty() {
        return Some(format!("missing name for {id}"));
    }
    if !school.roster.contains(id) {
        return Some(format!("unknown teacher {id}"));
    }
    if absent.contains(id) {
        return Some(format!("{id} is absent"));
    }
    if school.timetable.is_busy(id, unit.weekday, &unit.period) {
        return Some(format!("{id} teaches at {}", unit.period));
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::resolve_conflicts;
    use crate::planning::affected::resolve_staffing_units;
    use crate::planning::{
        AbsenceRecord, Assignment, PlanError, StaffingUnit, JUSTIFICATION_CONFLICT_REASSIGNED,
        JUSTIFICATION_INVALID_PROPOSAL, JUSTIFICATION_NO_FREE_TEACHER, MANUAL_SUBSTITUTE_ID,
    };
    use crate::recommender::local::LocalRecommender;
    use crate::recommender::{RawProposal, RecommendRequest, Recommender};
    use crate::timetable::sample::sample_school;
    use crate::timetable::{
        Period, Roster, School, Teacher, TeachingUnit, Timetable, TimetableSlot, Weekday,
    };

    fn slot(period: &str, class: &str, units: &[(&str, &str)]) -> TimetableSlot {
        TimetableSlot {
            weekday: Weekday::Monday,
            period: Period::new(period),
            class: class.to_string(),
            teaching_units: units
                .iter()
                .map(|(subject, teacher)| TeachingUnit::new(*subject, *teacher))
                .collect(),
        }
    }

    fn school(teachers: &[(&str, &str)], slots: Vec<TimetableSlot>) -> School {
        let roster = Roster::new(
            teachers
                .iter()
                .map(|(id, name)| Teacher::new(*id, *name))
                .collect(),
        )
        .expect("valid roster");
        let timetable = Timetable::new(slots).expect("valid timetable");
        School::new("Test", vec![Period::new("0720-0750")], roster, timetable)
            .expect("valid school")
    }

    fn proposal(unit: &StaffingUnit, id: &str, name: &str) -> RawProposal {
        RawProposal {
            day: Some(unit.weekday.to_string()),
            period: Some(unit.period.to_string()),
            class: Some(unit.class.clone()),
            subject: Some(unit.subject()),
            absent_teachers: Some(unit.absent_refs()),
            substitute_teacher_id: Some(id.to_string()),
            substitute_teacher_name: Some(name.to_string()),
            justification: Some("proposed".to_string()),
        }
    }

    fn plan(
        school: &School,
        absences: &[AbsenceRecord],
        build: impl Fn(&[StaffingUnit]) -> Vec<RawProposal>,
    ) -> (Vec<StaffingUnit>, Result<Vec<Assignment>, PlanError>) {
        let units = resolve_staffing_units(absences, school, Weekday::Monday).expect("units");
        let proposals = build(&units);
        let result = resolve_conflicts(proposals, &units, school, absences);
        (units, result)
    }

    fn scenario_a_school(with_spare: bool) -> School {
        let mut teachers = vec![("X", "Xavier"), ("Y", "Yusof"), ("Z", "Zainab")];
        if with_spare {
            teachers.push(("W", "Wong"));
        }
        school(
            &teachers,
            vec![
                slot("0720-0750", "Year 1", &[("BM", "X")]),
                slot("0720-0750", "Year 4", &[("PJ", "Y")]),
            ],
        )
    }

    #[test]
    fn second_claim_in_a_period_is_reassigned() {
        let school = scenario_a_school(true);
        let absences = vec![AbsenceRecord::new("X", ""), AbsenceRecord::new("Y", "")];
        let (_, result) = plan(&school, &absences, |units| {
            // reversed input order; sorting decides who keeps Z
            units.iter().rev().map(|u| proposal(u, "Z", "Zainab")).collect()
        });
        let assignments = result.expect("resolved");
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].class, "Year 1");
        assert_eq!(assignments[0].substitute_teacher_id, "Z");
        assert_eq!(assignments[0].justification, "proposed");
        assert_eq!(assignments[1].class, "Year 4");
        assert_eq!(assignments[1].substitute_teacher_id, "W");
        assert_eq!(assignments[1].substitute_teacher_name, "Wong");
        assert_eq!(assignments[1].justification, JUSTIFICATION_CONFLICT_REASSIGNED);
    }

    #[test]
    fn falls_back_to_placeholder_when_nobody_is_free() {
        let school = scenario_a_school(false);
        let absences = vec![AbsenceRecord::new("X", ""), AbsenceRecord::new("Y", "")];
        let (_, result) = plan(&school, &absences, |units| {
            units.iter().map(|u| proposal(u, "Z", "Zainab")).collect()
        });
        let assignments = result.expect("resolved");
        let fallback = &assignments[1];
        assert_eq!(fallback.substitute_teacher_id, MANUAL_SUBSTITUTE_ID);
        assert_eq!(fallback.substitute_teacher_name, "");
        assert_eq!(fallback.justification, JUSTIFICATION_NO_FREE_TEACHER);
    }

    #[test]
    fn joint_period_with_one_absent_teacher() {
        let school = school(
            &[("A", "Aminah"), ("B", "Bakar"), ("C", "Chong")],
            vec![slot("0720-0750", "Year 1", &[("PM", "A"), ("PI", "B")])],
        );
        let absences = vec![AbsenceRecord::new("A", "")];
        let (units, result) = plan(&school, &absences, |units| {
            units.iter().map(|u| proposal(u, "C", "Chong")).collect()
        });
        assert_eq!(units.len(), 1);
        let assignments = result.expect("resolved");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].absent_teachers.len(), 1);
        assert_eq!(assignments[0].absent_teachers[0].id, "A");
        assert_eq!(assignments[0].substitute_teacher_id, "C");
    }

    #[test]
    fn defective_proposals_become_placeholders() {
        let school = school(
            &[("A", "Aminah"), ("B", "Bakar"), ("C", "Chong"), ("D", "Devi")],
            vec![
                slot("0720-0750", "Year 1", &[("BM", "A")]),
                slot("0720-0750", "Year 2", &[("BI", "B")]),
                slot("0750-0820", "Year 1", &[("MT", "A")]),
                slot("0750-0820", "Year 3", &[("SN", "C")]),
                slot("0820-0850", "Year 1", &[("PJ", "A")]),
            ],
        );
        let absences = vec![AbsenceRecord::new("A", "")];
        let (_, result) = plan(&school, &absences, |units| {
            vec![
                // absent teacher
                proposal(&units[0], "A", "Aminah"),
                // teaches in that period
                proposal(&units[1], "C", "Chong"),
                // unknown id
                proposal(&units[2], "Q", "Qistina"),
            ]
        });
        let assignments = result.expect("resolved");
        assert_eq!(assignments.len(), 3);
        for assignment in &assignments {
            assert_eq!(assignment.substitute_teacher_id, MANUAL_SUBSTITUTE_ID);
            assert_eq!(assignment.justification, JUSTIFICATION_INVALID_PROPOSAL);
        }
    }

    #[test]
    fn missing_fields_are_contained_to_their_unit() {
        let school = scenario_a_school(true);
        let absences = vec![AbsenceRecord::new("X", ""), AbsenceRecord::new("Y", "")];
        let (_, result) = plan(&school, &absences, |units| {
            let mut no_id = proposal(&units[0], "", "");
            no_id.substitute_teacher_id = None;
            let mut no_name = proposal(&units[1], "W", "");
            no_name.substitute_teacher_name = None;
            vec![no_id, no_name]
        });
        let assignments = result.expect("resolved");
        assert!(assignments.iter().all(Assignment::is_manual));
    }

    #[test]
    fn missing_units_are_filled_and_duplicates_dropped() {
        let school = scenario_a_school(true);
        let absences = vec![AbsenceRecord::new("X", ""), AbsenceRecord::new("Y", "")];
        let (_, result) = plan(&school, &absences, |units| {
            vec![proposal(&units[0], "Z", "Zainab"), proposal(&units[0], "W", "Wong")]
        });
        let assignments = result.expect("resolved");
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].substitute_teacher_id, "Z");
        assert_eq!(assignments[1].substitute_teacher_id, MANUAL_SUBSTITUTE_ID);
        assert_eq!(assignments[1].justification, JUSTIFICATION_INVALID_PROPOSAL);
    }

    #[test]
    fn missing_or_mismatched_fields_only_affect_their_unit() {
        let school = school(
            &[("A", "Aminah"), ("B", "Bakar"), ("Z", "Zainab"), ("W", "Wong")],
            vec![
                slot("0720-0750", "Year 1", &[("BM", "A")]),
                slot("0750-0820", "Year 1", &[("MT", "A")]),
                slot("0820-0850", "Year 1", &[("SN", "A")]),
                slot("0850-0920", "Year 1", &[("PJ", "A")]),
                slot("0920-0950", "Year 1", &[("BI", "A")]),
                slot("0950-1020", "Year 1", &[("PM", "A")]),
            ],
        );
        let absences = vec![AbsenceRecord::new("A", "")];
        let (units, result) = plan(&school, &absences, |units| {
            let mut bare = proposal(&units[0], "Z", "Zainab");
            bare.day = None;
            bare.subject = None;
            bare.justification = None;
            let mut no_absent_list = proposal(&units[1], "Z", "Zainab");
            no_absent_list.absent_teachers = None;
            let mut blank_justification = proposal(&units[2], "Z", "Zainab");
            blank_justification.justification = Some("  ".to_string());
            let mut free_text_day = proposal(&units[3], "Z", "Zainab");
            free_text_day.day = Some("Isnin, 3 Mac".to_string());
            let mut other_day = proposal(&units[4], "Z", "Zainab");
            other_day.day = Some("SELASA".to_string());
            let mut local_name = proposal(&units[5], "W", "Wong");
            local_name.day = Some("Isnin".to_string());
            vec![bare, no_absent_list, blank_justification, free_text_day, other_day, local_name]
        });
        let assignments = result.expect("resolved");
        assert_eq!(assignments.len(), units.len());
        for assignment in &assignments[..5] {
            assert_eq!(assignment.substitute_teacher_id, MANUAL_SUBSTITUTE_ID);
            assert_eq!(assignment.substitute_teacher_name, "");
            assert_eq!(assignment.justification, JUSTIFICATION_INVALID_PROPOSAL);
        }
        assert_eq!(assignments[5].substitute_teacher_id, "W");
        assert_eq!(assignments[5].justification, "proposed");
    }

    #[test]
    fn sentinels_in_one_period_are_never_claimed() {
        let school = scenario_a_school(false);
        let absences = vec![AbsenceRecord::new("X", ""), AbsenceRecord::new("Y", "")];
        let (_, result) = plan(&school, &absences, |units| {
            units
                .iter()
                .map(|u| {
                    let mut p = proposal(u, MANUAL_SUBSTITUTE_ID, "");
                    p.justification = Some(format!("nobody free for {}", u.class));
                    p
                })
                .collect()
        });
        let assignments = result.expect("resolved");
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].period, assignments[1].period);
        for assignment in &assignments {
            assert_eq!(assignment.substitute_teacher_id, MANUAL_SUBSTITUTE_ID);
            assert_eq!(
                assignment.justification,
                format!("nobody free for {}", assignment.class)
            );
        }
    }

    #[test]
    fn unattributable_proposals_fail_the_run() {
        let school = scenario_a_school(true);
        let absences = vec![AbsenceRecord::new("X", "")];

        let (_, unknown_period) = plan(&school, &absences, |units| {
            let mut p = proposal(&units[0], "Z", "Zainab");
            p.period = Some("1300-1330".to_string());
            vec![p]
        });
        assert!(matches!(unknown_period, Err(PlanError::RecommenderContractViolation(_))));

        let (_, unknown_class) = plan(&school, &absences, |units| {
            let mut p = proposal(&units[0], "Z", "Zainab");
            p.class = Some("Year 9".to_string());
            vec![p]
        });
        assert!(matches!(unknown_class, Err(PlanError::RecommenderContractViolation(_))));
    }

    #[test]
    fn sample_school_plan_holds_invariants_and_is_idempotent() {
        let school = sample_school().expect("sample school");
        let absences = vec![
            AbsenceRecord::new("AY", "Kursus"),
            AbsenceRecord::new("IM", ""),
            AbsenceRecord::new("NS", "Cuti sakit"),
        ];
        let units =
            resolve_staffing_units(&absences, &school, Weekday::Monday).expect("units");
        let request = RecommendRequest {
            weekday: Weekday::Monday,
            absences: &absences,
            staffing_units: &units,
            school: &school,
        };
        let proposals =
            tokio_test::block_on(LocalRecommender.propose(&request)).expect("proposals");
        let first = resolve_conflicts(proposals, &units, &school, &absences).expect("resolved");

        // completeness
        assert_eq!(first.len(), units.len());
        let absent: BTreeSet<&str> = absences.iter().map(|a| a.teacher_id.as_str()).collect();
        let mut seen = BTreeSet::new();
        for assignment in &first {
            if let Some(id) = assignment.substitute_teacher() {
                // no self-substitution, no double-booking, never busy
                assert!(!absent.contains(id));
                assert!(seen.insert((assignment.period.clone(), id.to_string())));
                assert!(!school
                    .timetable
                    .is_busy(id, Weekday::Monday, &assignment.period));
            }
        }

        let again = resolve_conflicts(
            first.iter().map(RawProposal::from).collect(),
            &units,
            &school,
            &absences,
        )
        .expect("resolved again");
        assert_eq!(first, again);
    }
}
