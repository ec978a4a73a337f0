use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::output::{absent_label, format_report_date, substitute_label};
use crate::planning::plan::PlanReport;
use crate::timetable::{School, Teacher, Weekday};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_plan_report(report: &PlanReport, footer: &str) -> String {
    let info = &report.plan.info;
    let preparer = if report.preparer_name.trim().is_empty() {
        "Tidak dinyatakan"
    } else {
        report.preparer_name.as_str()
    };
    let absent = if info.absences.is_empty() {
        "Tiada".to_string()
    } else {
        info.absences
            .iter()
            .map(|a| format!("{} ({})", a.name, a.reason))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    out.push_str(&format!("{}\nPelan Guru Ganti\n\n", report.school_name));
    out.push_str(&format!("Disediakan Oleh: {preparer}\n"));
    out.push_str(&format!("Tarikh: {}\n", format_report_date(info.date)));
    out.push_str(&format!("Hari: {}\n", info.weekday));
    out.push_str(&format!("Guru Tidak Hadir: {absent}\n\n"));

    if report.plan.assignments.is_empty() {
        out.push_str("Tiada kelas terjejas.\n");
    } else {
        let mut table = new_table();
        table.set_header(vec![
            "#",
            "Masa",
            "Kelas",
            "Subjek",
            "Guru Tidak Hadir",
            "Guru Ganti",
            "Justifikasi",
        ]);
        for (index, a) in report.plan.assignments.iter().enumerate() {
            let substitute = Cell::new(substitute_label(a));
            let substitute = if a.is_manual() || a.is_undecided() {
                substitute.fg(Color::Yellow)
            } else {
                substitute
            };
            table.add_row(Row::from(vec![
                Cell::new(index),
                Cell::new(&a.period),
                Cell::new(&a.class),
                Cell::new(&a.subject),
                Cell::new(absent_label(a)),
                substitute,
                Cell::new(&a.justification),
            ]));
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }

    if !footer.trim().is_empty() {
        out.push_str(&format!("\n{}\n", footer.trim()));
    }
    out
}

pub fn render_timetable_table(school: &School, day: Option<Weekday>) -> String {
    let days: Vec<Weekday> = match day {
        Some(day) => vec![day],
        None => Weekday::ALL.to_vec(),
    };
    let mut sections = Vec::new();
    for weekday in days {
        let slots: Vec<_> = school.timetable.slots_on(weekday).collect();
        if slots.is_empty() {
            sections.push(format!("{weekday}\n(tiada jadual)"));
            continue;
        }
        let mut classes: Vec<&str> = slots.iter().map(|s| s.class.as_str()).collect();
        classes.sort_unstable();
        classes.dedup();

        // wide grid; wrapping would split joint cells
        let mut table = new_table();
        table.set_content_arrangement(ContentArrangement::Disabled);
        let mut header = vec!["Kelas".to_string()];
        header.extend(school.periods.iter().map(|p| p.to_string()));
        table.set_header(header);
        for class in classes {
            let mut row = vec![class.to_string()];
            for period in &school.periods {
                let cell = slots
                    .iter()
                    .find(|s| s.class == class && &s.period == period)
                    .map(|s| {
                        s.teaching_units
                            .iter()
                            .map(|u| match &u.teacher_id {
                                Some(id) => format!("{}/{id}", u.subject),
                                None => u.subject.clone(),
                            })
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default();
                row.push(cell);
            }
            table.add_row(row);
        }
        sections.push(format!("{weekday}\n{table}"));
    }
    sections.join("\n\n")
}

pub fn render_teachers_table(teachers: &[Teacher]) -> String {
    let mut table = new_table();
    table.set_header(vec!["ID", "Nama"]);
    for teacher in teachers {
        table.add_row(vec![teacher.id.as_str(), teacher.name.as_str()]);
    }
    table.to_string()
}
