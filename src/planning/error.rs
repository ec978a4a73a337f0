use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("recommender returned an unusable response: {0}")]
    RecommenderContractViolation(String),
    #[error("recommender unavailable: {0}")]
    RecommenderUnavailable(String),
    #[error("unknown teacher: {0}")]
    UnknownTeacher(String),
    #[error("no assignment at row {0}")]
    UnknownAssignment(usize),
}

impl PlanError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::RecommenderContractViolation(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::RecommenderUnavailable(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnknownTeacher(_) | Self::UnknownAssignment(_)
        )
    }
}
