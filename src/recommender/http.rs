use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::planning::PlanError;
use crate::recommender::RawProposal;
use crate::timetable::{Roster, TeacherRef};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("substitute-planner/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

pub async fn post_json(
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    timeout: Duration,
) -> Result<Value, PlanError> {
    let mut request = HTTP_CLIENT.post(url).timeout(timeout).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request
        .send()
        .await
        .map_err(|e| PlanError::unavailable(format!("request failed: {}", e.without_url())))?;
    let status = response.status();
    let text = response.text().await.map_err(|e| {
        PlanError::unavailable(format!("failed reading response body: {}", e.without_url()))
    })?;
    if !status.is_success() {
        let preview: String = text.chars().take(180).collect();
        return Err(PlanError::unavailable(format!("service returned {status}: {preview}")));
    }
    serde_json::from_str(&text).map_err(|e| PlanError::contract(format!("invalid JSON response: {e}")))
}

pub fn parse_proposals(value: &Value, roster: &Roster) -> Result<Vec<RawProposal>, PlanError> {
    let Some(items) = candidate_array(value) else {
        return Err(PlanError::contract("expected a JSON array of proposals"));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(object) = item.as_object() else {
            return Err(PlanError::contract("proposal entries must be JSON objects"));
        };
        out.push(RawProposal {
            day: string_field(object, &["day", "weekday"]),
            period: string_field(object, &["period", "time"]),
            class: string_field(object, &["class", "className", "class_name"]),
            subject: string_field(object, &["subject"]),
            absent_teachers: absent_teachers_field(object, roster),
            substitute_teacher_id: string_field(
                object,
                &["substituteTeacherId", "substitute_teacher_id"],
            ),
            substitute_teacher_name: string_field(
                object,
                &["substituteTeacherName", "substitute_teacher_name"],
            ),
            justification: string_field(object, &["justification"]),
        });
    }
    Ok(out)
}

fn candidate_array(value: &Value) -> Option<&Vec<Value>> {
    if let Some(arr) = value.as_array() {
        return Some(arr);
    }
    let object = value.as_object()?;
    for key in ["proposals", "substitutions", "data", "items"] {
        if let Some(arr) = object_get_case_insensitive(object, key).and_then(Value::as_array) {
            return Some(arr);
        }
    }
    None
}

fn absent_teachers_field(object: &Map<String, Value>, roster: &Roster) -> Option<Vec<TeacherRef>> {
    let entries = ["absentTeachers", "absent_teachers"]
        .iter()
        .find_map(|key| object_get_case_insensitive(object, key))
        .and_then(Value::as_array)?;

    let refs = entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(teacher_ref_from_name(name, roster)),
            Value::Object(inner) => {
                let id = string_field(inner, &["id", "teacherId", "teacher_id"]);
                let name = string_field(inner, &["name"]);
                match (id, name) {
                    (Some(id), Some(name)) => Some(TeacherRef { id, name }),
                    (Some(id), None) => Some(TeacherRef {
                        name: roster
                            .by_id(&id)
                            .map(|t| t.name.clone())
                            .unwrap_or_default(),
                        id,
                    }),
                    (None, Some(name)) => Some(teacher_ref_from_name(&name, roster)),
                    (None, None) => None,
                }
            }
            _ => None,
        })
        .collect();
    Some(refs)
}

fn teacher_ref_from_name(name: &str, roster: &Roster) -> TeacherRef {
    TeacherRef {
        id: roster
            .by_name(name)
            .map(|t| t.id.clone())
            .unwrap_or_default(),
        name: name.trim().to_string(),
    }
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match object_get_case_insensitive(object, key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn object_get_case_insensitive<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}
