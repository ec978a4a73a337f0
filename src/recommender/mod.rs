pub mod gemini;
pub mod http;
pub mod local;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RecommenderConfig;
use crate::planning::{AbsenceRecord, Assignment, PlanError, StaffingUnit};
use crate::recommender::gemini::GeminiRecommender;
use crate::recommender::local::LocalRecommender;
use crate::timetable::{School, TeacherRef, Weekday};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommenderKind {
    Local,
    Gemini,
}

impl RecommenderKind {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Gemini => "gemini",
        }
    }
}

impl Display for RecommenderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown recommender: {0}")]
pub struct RecommenderParseError(pub String);

impl FromStr for RecommenderKind {
    type Err = RecommenderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "offline" => Ok(Self::Local),
            "gemini" | "ai" => Ok(Self::Gemini),
            _ => Err(RecommenderParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecommendRequest<'a> {
    pub weekday: Weekday,
    pub absences: &'a [AbsenceRecord],
    pub staffing_units: &'a [StaffingUnit],
    pub school: &'a School,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawProposal {
    pub day: Option<String>,
    pub period: Option<String>,
    pub class: Option<String>,
    pub subject: Option<String>,
    pub absent_teachers: Option<Vec<TeacherRef>>,
    pub substitute_teacher_id: Option<String>,
    pub substitute_teacher_name: Option<String>,
    pub justification: Option<String>,
}

impl From<&Assignment> for RawProposal {
    fn from(value: &Assignment) -> Self {
        Self {
            day: Some(value.weekday.to_string()),
            period: Some(value.period.to_string()),
            class: Some(value.class.clone()),
            subject: Some(value.subject.clone()),
            absent_teachers: Some(value.absent_teachers.clone()),
            substitute_teacher_id: Some(value.substitute_teacher_id.clone()),
            substitute_teacher_name: Some(value.substitute_teacher_name.clone()),
            justification: Some(value.justification.clone()),
        }
    }
}

#[async_trait]
pub trait Recommender: Send + Sync {
    fn kind(&self) -> RecommenderKind;
    fn name(&self) -> &str;
    async fn propose(&self, request: &RecommendRequest<'_>) -> Result<Vec<RawProposal>, PlanError>;
}

pub fn build_recommender(kind: RecommenderKind, config: &RecommenderConfig) -> Arc<dyn Recommender> {
    match kind {
        RecommenderKind::Local => Arc::new(LocalRecommender),
        RecommenderKind::Gemini => Arc::new(GeminiRecommender::from_config(config)),
    }
}
