use crate::models::ApiErrorEnvelope;
use thiserror::Error;

/// Substrings the service uses when it refuses a key.
const REJECTED_KEY_MARKERS: &[&str] = &["API key not valid", "API_KEY_INVALID"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialProblem {
    /// Nothing was entered.
    Missing,
    /// The service refused the key.
    Rejected,
}

/// Every failure a generation can end in. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{}", credential_message(.0))]
    InvalidCredential(CredentialProblem),

    #[error("API에서 이미지를 생성하지 못했습니다. 프롬프트를 수정하여 다시 시도해보세요.")]
    EmptyResult,

    #[error("이미지 생성 실패: {0}")]
    ServiceError(String),

    #[error("알 수 없는 오류로 인해 이미지 생성에 실패했습니다.")]
    UnknownError,
}

fn credential_message(problem: &CredentialProblem) -> &'static str {
    match problem {
        CredentialProblem::Missing => "Google AI Studio API 키를 입력해주세요.",
        CredentialProblem::Rejected => {
            "API 키가 유효하지 않습니다. 올바른 키를 입력했는지 확인해주세요."
        }
    }
}

impl GenerationError {
    pub fn is_credential_problem(&self) -> bool {
        matches!(self, GenerationError::InvalidCredential(_))
    }
}

/// Turn raw failure text (an HTTP error body or a transport error) into one
/// of the [`GenerationError`] kinds.
///
/// Google error envelopes (`{"error": {"message": ..}}`) are unwrapped so the
/// detail shown to the user is the service's own sentence rather than JSON.
pub fn classify_failure(raw: &str) -> GenerationError {
    let raw = raw.trim();
    if raw.is_empty() {
        return GenerationError::UnknownError;
    }

    let detail = match serde_json::from_str::<ApiErrorEnvelope>(raw) {
        Ok(envelope) => envelope.error.describe(),
        Err(_) => raw.to_string(),
    };

    if REJECTED_KEY_MARKERS
        .iter()
        .any(|marker| raw.contains(marker) || detail.contains(marker))
    {
        return GenerationError::InvalidCredential(CredentialProblem::Rejected);
    }

    if detail.trim().is_empty() {
        GenerationError::UnknownError
    } else {
        GenerationError::ServiceError(detail)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

pub type Result<T> = std::result::Result<T, GenerationError>;
