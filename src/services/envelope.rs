use crate::core::error::StageError;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

/// Uniform outcome of every provider adapter call.
///
/// Adapters implement their transport with `anyhow::Result` and the trait's
/// provided method wraps it through [`Envelope::capture`], so callers only
/// ever see this one shape regardless of provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope<T> {
    Success { data: T, duration_ms: u64 },
    Failure { error: String, duration_ms: u64 },
}

impl<T> Envelope<T> {
    pub async fn capture<F>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(data) => Envelope::Success { data, duration_ms },
            Err(e) => Envelope::Failure {
                // {:#} keeps the context chain on one line
                error: format!("{:#}", e),
                duration_ms,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            Envelope::Success { duration_ms, .. } | Envelope::Failure { duration_ms, .. } => {
                *duration_ms
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Envelope::Failure { error, .. } => Some(error),
            Envelope::Success { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        match self {
            Envelope::Success { data, duration_ms } => Envelope::Success {
                data: f(data),
                duration_ms,
            },
            Envelope::Failure { error, duration_ms } => Envelope::Failure { error, duration_ms },
        }
    }

    pub fn into_result(self) -> Result<T, StageError> {
        match self {
            Envelope::Success { data, .. } => Ok(data),
            Envelope::Failure { error, .. } => Err(StageError::Provider(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[tokio::test]
    async fn test_capture_success_and_failure() {
        let ok: Envelope<u32> = Envelope::capture(async { Ok(7) }).await;
        assert!(ok.is_success());
        assert_eq!(ok.clone().into_result(), Ok(7));
        assert_eq!(ok.map(|v| v * 2).into_result(), Ok(14));

        let failed: Envelope<u32> = Envelope::capture(async {
            Err::<u32, _>(anyhow!("HTTP 503")).context("7verse request failed")
        })
        .await;
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some("7verse request failed: HTTP 503"));
        assert_eq!(
            failed.into_result(),
            Err(StageError::Provider("7verse request failed: HTTP 503".to_string()))
        );
    }

    #[test]
    fn test_serialized_shape_is_tagged() {
        let env: Envelope<String> = Envelope::Success {
            data: "hi".to_string(),
            duration_ms: 12,
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], "hi");
        assert_eq!(json["duration_ms"], 12);
    }
}
