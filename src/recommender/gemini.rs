use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::RecommenderConfig;
use crate::planning::PlanError;
use crate::recommender::http::{parse_proposals, post_json};
use crate::recommender::{RawProposal, RecommendRequest, Recommender, RecommenderKind};
use crate::timetable::subject_label;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiRecommender {
    endpoint: String,
    model: String,
    api_key_env: String,
    temperature: f32,
    timeout: Duration,
}

impl GeminiRecommender {
    pub fn from_config(config: &RecommenderConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    fn api_key(&self) -> Result<String, PlanError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(PlanError::unavailable(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))),
        }
    }

    fn request_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    pub fn request_body(&self, request: &RecommendRequest<'_>) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [ { "text": build_prompt(request) } ] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
                "temperature": self.temperature,
            }
        })
    }
}

#[async_trait]
impl Recommender for GeminiRecommender {
    fn kind(&self) -> RecommenderKind {
        RecommenderKind::Gemini
    }

    fn name(&self) -> &str {
        &self.model
    }

    async fn propose(&self, request: &RecommendRequest<'_>) -> Result<Vec<RawProposal>, PlanError> {
        let api_key = self.api_key()?;
        let body = self.request_body(request);
        info!(
            "requesting {} substitutes from {}",
            request.staffing_units.len(),
            self.model
        );
        let headers = [(API_KEY_HEADER, api_key.as_str())];
        let response = post_json(&self.request_url(), &headers, &body, self.timeout).await?;
        let text = response_text(&response)?;
        let payload: Value = serde_json::from_str(text.trim())
            .map_err(|e| PlanError::contract(format!("model output is not JSON: {e}")))?;
        let proposals = parse_proposals(&payload, &request.school.roster)?;
        debug!("{} returned {} proposals", self.model, proposals.len());
        Ok(proposals)
    }
}

fn response_text(response: &Value) -> Result<String, PlanError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| PlanError::contract("response has no candidate content"))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(PlanError::contract("candidate content is empty"));
    }
    Ok(text)
}

fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "day": { "type": "STRING" },
                "time": { "type": "STRING" },
                "class": { "type": "STRING" },
                "subject": { "type": "STRING" },
                "absentTeachers": { "type": "ARRAY", "items": { "type": "STRING" } },
                "substituteTeacherId": { "type": "STRING" },
                "substituteTeacherName": { "type": "STRING" },
                "justification": { "type": "STRING" }
            },
            "required": [
                "day", "time", "class", "subject", "absentTeachers",
                "substituteTeacherId", "substituteTeacherName", "justification"
            ]
        }
    })
}

pub fn build_prompt(request: &RecommendRequest<'_>) -> String {
    let school = request.school;
    let day = request.weekday;

    let absent_lines: Vec<String> = request
        .absences
        .iter()
        .map(|a| {
            let id = a.teacher_id.trim();
            let name = school
                .roster
                .by_id(id)
                .map(|t| t.name.as_str())
                .unwrap_or(id);
            format!("- {name} (ID: {id}), reason: {}", a.reason_or_default())
        })
        .collect();

    let timetable_lines: Vec<String> = school
        .timetable
        .slots_on(day)
        .map(|slot| {
            let teachers: Vec<&str> = slot.teacher_ids().collect();
            format!(
                "- {} {}: {} [{}]",
                slot.period,
                slot.class,
                subject_label(&slot.teaching_units),
                teachers.join(", ")
            )
        })
        .collect();

    let roster_lines: Vec<String> = school
        .roster
        .teachers()
        .iter()
        .map(|t| format!("- {} (ID: {})", t.name, t.id))
        .collect();

    let unit_lines: Vec<String> = request
        .staffing_units
        .iter()
        .map(|unit| {
            let absent: Vec<&str> = unit.absent.iter().map(|a| a.name.as_str()).collect();
            format!(
                "- {} {}: {} (absent: {})",
                unit.period,
                unit.class,
                unit.subject(),
                absent.join(", ")
            )
        })
        .collect();

    format!(
        "You are the senior assistant for administration at {school_name}. \
Find one substitute teacher for every class period left without a teacher on {day}.

ABSENT TEACHERS:
{absent}

FULL TIMETABLE FOR {day} (period class: subject [teacher ids]):
{timetable}

ALL TEACHERS:
{roster}

PERIODS NEEDING A SUBSTITUTE:
{units}

RULES:
1. Propose exactly one substitute for each period listed above, on {day} only.
2. An absent teacher must never be proposed.
3. A substitute must be free in that period: no class of their own and not already proposed for another class at the same time.
4. A joint period (several subjects in one class) needs one substitute, even when all of its teachers are absent. List every absent teacher of that period.
5. Prefer, in order: a teacher of the same subject, then a teacher of the same class, then the teacher with the lightest load that day.
6. If no teacher is free, use substituteTeacherId \"LAIN_LAIN\" with an empty substituteTeacherName.
7. Give a short justification that names the teacher being replaced.
8. Answer with JSON only, following the response schema. Use the period label for \"time\" and \"{day}\" for \"day\".",
        school_name = school.name,
        absent = absent_lines.join("\n"),
        timetable = timetable_lines.join("\n"),
        roster = roster_lines.join("\n"),
        units = unit_lines.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{response_text, GeminiRecommender};
    use crate::config::RecommenderConfig;
    use crate::planning::affected::resolve_staffing_units;
    use crate::planning::{AbsenceRecord, PlanError};
    use crate::recommender::{RecommendRequest, Recommender};
    use crate::timetable::sample::sample_school;
    use crate::timetable::Weekday;

    #[test]
    fn builds_generate_content_body() {
        let school = sample_school().expect("sample school");
        let absences = vec![AbsenceRecord::new("AY", "Kursus")];
        let units = resolve_staffing_units(&absences, &school, Weekday::Monday).expect("units");
        let request = RecommendRequest {
            weekday: Weekday::Monday,
            absences: &absences,
            staffing_units: &units,
            school: &school,
        };
        let recommender = GeminiRecommender::from_config(&RecommenderConfig::default());
        let body = recommender.request_body(&request);

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
        let prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .expect("prompt text");
        assert!(prompt.contains("ISNIN"));
        assert!(prompt.contains("(ID: AY), reason: Kursus"));
        assert!(prompt.contains("LAIN_LAIN"));
    }

    #[test]
    fn extracts_candidate_text() {
        let response = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "[{\"time\":" }, { "text": "\"0720-0750\"}]" } ] } }
            ]
        });
        assert_eq!(
            response_text(&response).expect("text"),
            "[{\"time\":\"0720-0750\"}]"
        );
        let empty = response_text(&json!({ "candidates": [] }));
        assert!(matches!(empty, Err(PlanError::RecommenderContractViolation(_))));
    }

    #[test]
    fn missing_api_key_is_unavailable() {
        let school = sample_school().expect("sample school");
        let absences = vec![AbsenceRecord::new("AY", "")];
        let units = resolve_staffing_units(&absences, &school, Weekday::Monday).expect("units");
        let request = RecommendRequest {
            weekday: Weekday::Monday,
            absences: &absences,
            staffing_units: &units,
            school: &school,
        };
        let config = RecommenderConfig {
            api_key_env: "SUBSTITUTE_PLANNER_TEST_UNSET_KEY".to_string(),
            ..RecommenderConfig::default()
        };
        let result = tokio_test::block_on(GeminiRecommender::from_config(&config).propose(&request));
        assert!(matches!(result, Err(PlanError::RecommenderUnavailable(_))));
    }

    #[test]
    fn transport_errors_do_not_leak_the_api_key() {
        let school = sample_school().expect("sample school");
        let absences = vec![AbsenceRecord::new("AY", "")];
        let units = resolve_staffing_units(&absences, &school, Weekday::Monday).expect("units");
        let request = RecommendRequest {
            weekday: Weekday::Monday,
            absences: &absences,
            staffing_units: &units,
            school: &school,
        };
        std::env::set_var("SUBSTITUTE_PLANNER_TEST_LEAK_KEY", "SECRET-KEY-123");
        let config = RecommenderConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            api_key_env: "SUBSTITUTE_PLANNER_TEST_LEAK_KEY".to_string(),
            timeout_secs: 5,
            ..RecommenderConfig::default()
        };
        let recommender = GeminiRecommender::from_config(&config);
        assert!(!recommender.request_url().contains("SECRET-KEY-123"));

        let result = tokio_test::block_on(recommender.propose(&request));
        let message = match &result {
            Err(PlanError::RecommenderUnavailable(message)) => message.clone(),
            other => panic!("expected an unavailable error, got {other:?}"),
        };
        assert!(!message.contains("SECRET-KEY-123"), "{message}");
        assert!(!message.contains("127.0.0.1:1"), "{message}");
    }
}
