use anyhow::Result;

use crate::output::{absent_label, substitute_label};
use crate::planning::plan::PlanReport;
use crate::timetable::{subject_label, Teacher, TimetableSlot};

pub fn plan_to_csv(report: &PlanReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "row",
        "date",
        "day",
        "period",
        "class",
        "subject",
        "absent_teachers",
        "substitute_teacher_id",
        "substitute",
        "justification",
    ])?;
    let info = &report.plan.info;
    for (index, a) in report.plan.assignments.iter().enumerate() {
        writer.write_record([
            index.to_string(),
            info.date.to_string(),
            a.weekday.to_string(),
            a.period.to_string(),
            a.class.clone(),
            a.subject.clone(),
            absent_label(a),
            a.substitute_teacher_id.clone(),
            substitute_label(a),
            a.justification.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn teachers_to_csv(teachers: &[Teacher]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["id", "name"])?;
    for teacher in teachers {
        writer.write_record([teacher.id.as_str(), teacher.name.as_str()])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn slots_to_csv(slots: &[&TimetableSlot]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["day", "period", "class", "subject", "teachers"])?;
    for slot in slots {
        let teachers: Vec<&str> = slot.teacher_ids().collect();
        writer.write_record([
            slot.weekday.to_string(),
            slot.period.to_string(),
            slot.class.clone(),
            subject_label(&slot.teaching_units),
            teachers.join(" "),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
