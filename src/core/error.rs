use thiserror::Error;

/// Failure of a single generation stage.
///
/// Stages never apply their own fallback; they hand one of these back and
/// the wizard decides whether to substitute the stage default.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageError {
    /// Network or HTTP failure reported by a provider adapter.
    #[error("provider error: {0}")]
    Provider(String),

    /// Model output could not be decoded as a JSON object.
    #[error("parse error: {message}")]
    Parse { message: String, cleaned: String },

    /// Decoded output is missing required fields or breaks a content rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required input (usually the uploaded image) is not available.
    #[error("resource error: {0}")]
    Resource(String),
}

impl StageError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::Parse { .. } => "parse",
            Self::Validation(_) => "validation",
            Self::Resource(_) => "resource",
        }
    }
}

pub type StageResult<T> = std::result::Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = StageError::validation("expected 3 prompts, got 1");
        assert_eq!(err.to_string(), "validation error: expected 3 prompts, got 1");
        assert_eq!(err.kind(), "validation");

        let err = StageError::Parse {
            message: "no JSON object found".to_string(),
            cleaned: "hello".to_string(),
        };
        assert_eq!(err.to_string(), "parse error: no JSON object found");
    }
}
