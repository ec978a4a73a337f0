use std::cmp::Reverse;

use async_trait::async_trait;
use tracing::debug;

use crate::planning::{PlanError, StaffingUnit, MANUAL_SUBSTITUTE_ID};
use crate::recommender::{RawProposal, RecommendRequest, Recommender, RecommenderKind};
use crate::timetable::{School, Teacher, Weekday};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRecommender;

#[async_trait]
impl Recommender for LocalRecommender {
    fn kind(&self) -> RecommenderKind {
        RecommenderKind::Local
    }

    fn name(&self) -> &str {
        "Local preference ranking"
    }

    async fn propose(&self, request: &RecommendRequest<'_>) -> Result<Vec<RawProposal>, PlanError> {
        let absent_ids: Vec<&str> = request
            .absences
            .iter()
            .map(|a| a.teacher_id.trim())
            .collect();
        let proposals: Vec<RawProposal> = request
            .staffing_units
            .iter()
            .map(|unit| propose_for_unit(unit, request.school, request.weekday, &absent_ids))
            .collect();
        debug!("local recommender proposed {} substitutes", proposals.len());
        Ok(proposals)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    same_subject: Reverse<bool>,
    same_class: Reverse<bool>,
    load: usize,
    roster_index: usize,
}

fn propose_for_unit(
    unit: &StaffingUnit,
    school: &School,
    weekday: Weekday,
    absent_ids: &[&str],
) -> RawProposal {
    let absent_subjects: Vec<&str> = unit
        .teaching_units
        .iter()
        .filter(|u| {
            u.teacher_id
                .as_deref()
                .is_some_and(|id| unit.absent.iter().any(|a| a.teacher_id == id))
        })
        .map(|u| u.subject.as_str())
        .collect();
    let timetable = &school.timetable;

    let best = school
        .roster
        .teachers()
        .iter()
        .enumerate()
        .filter(|(_, t)| !absent_ids.contains(&t.id.as_str()))
        .filter(|(_, t)| !timetable.is_busy(&t.id, weekday, &unit.period))
        .map(|(roster_index, t)| {
            let rank = Rank {
                same_subject: Reverse(
                    absent_subjects
                        .iter()
                        .any(|s| timetable.teaches_subject(&t.id, s)),
                ),
                same_class: Reverse(timetable.teaches_class(&t.id, &unit.class)),
                load: timetable.load_on(&t.id, weekday),
                roster_index,
            };
            (rank, t)
        })
        .min_by(|a, b| a.0.cmp(&b.0));

    let replaced = unit
        .absent
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let base = RawProposal {
        day: Some(weekday.to_string()),
        period: Some(unit.period.to_string()),
        class: Some(unit.class.clone()),
        subject: Some(unit.subject()),
        absent_teachers: Some(unit.absent_refs()),
        ..RawProposal::default()
    };

    match best {
        Some((rank, teacher)) => RawProposal {
            substitute_teacher_id: Some(teacher.id.clone()),
            substitute_teacher_name: Some(teacher.name.clone()),
            justification: Some(justify(teacher, &rank, &replaced)),
            ..base
        },
        None => RawProposal {
            substitute_teacher_id: Some(MANUAL_SUBSTITUTE_ID.to_string()),
            substitute_teacher_name: Some(String::new()),
            justification: Some(format!("No free teacher to replace {replaced}.")),
            ..base
        },
    }
}

fn justify(teacher: &Teacher, rank: &Rank, replaced: &str) -> String {
    let reason = if rank.same_subject.0 {
        "teaches the same subject"
    } else if rank.same_class.0 {
        "already teaches this class"
    } else {
        "has the lightest load that day"
    };
    format!(
        "{} is free, {reason} ({} periods), replacing {replaced}.",
        teacher.name, rank.load
    )
}
