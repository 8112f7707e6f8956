//! Pipeline-specific error types
//!
//! Errors raised while talking to the completion endpoint and while turning its
//! answers into stage results. Every failure that ends a run is attributed to
//! the stage that produced it.

use crate::orchestrator::stages::Stage;
use thiserror::Error;

/// Errors returned by a [`CompletionClient`](crate::orchestrator::api_client::CompletionClient)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The request never produced an HTTP response (DNS, connect, reset, timeout)
    #[error("request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status
    #[error("endpoint returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// 2xx response without `choices[0].message.content`
    #[error("response is missing choices[0].message.content: {0}")]
    MissingContent(String),
}

/// Why a stage failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    /// Network failure before any response arrived
    #[error("could not be reached: {0}")]
    Transport(String),

    /// The run's abort signal fired while the stage was pending
    #[error("could not be reached: cancelled")]
    Cancelled,

    /// Non-2xx HTTP response
    #[error("failed with HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Response arrived but the content field was absent or empty
    #[error("returned no content ({0})")]
    MissingContent(String),

    /// Content was present but did not yield a valid stage object
    #[error("returned unparseable output ({reason}); raw response: {raw}")]
    Parse {
        /// Parser or schema message
        reason: String,
        /// Raw model text, for diagnosis
        raw: String,
    },
}

impl From<CompletionError> for StageFailure {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Transport(msg) => StageFailure::Transport(msg),
            CompletionError::Http { status, body } => StageFailure::Http { status, body },
            CompletionError::MissingContent(msg) => StageFailure::MissingContent(msg),
        }
    }
}

/// A failure attributed to one stage of a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Stage {} ({}) {}", .stage.number(), .stage.name(), .failure)]
pub struct StageError {
    /// Stage that failed
    pub stage: Stage,
    /// What went wrong
    pub failure: StageFailure,
}

impl StageError {
    /// Attribute a failure to a stage
    pub fn new(stage: Stage, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    /// Whether the failure came from cancellation rather than the endpoint
    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, StageFailure::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_names_stage() {
        let err = StageError::new(
            Stage::Wish,
            CompletionError::Transport("connection refused".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Stage 2 (Wish) could not be reached: connection refused"
        );
    }

    #[test]
    fn test_http_error_keeps_status_and_body() {
        let err = StageError::new(
            Stage::Outcome,
            CompletionError::Http {
                status: 503,
                body: "upstream busy".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("Stage 3 (Outcome)"));
        assert!(msg.contains("503"));
        assert!(msg.contains("upstream busy"));
    }

    #[test]
    fn test_parse_error_carries_raw_text() {
        let err = StageError::new(
            Stage::Plan,
            StageFailure::Parse {
                reason: "no JSON object found".to_string(),
                raw: "Sorry, I cannot help".to_string(),
            },
        );
        assert!(err.to_string().contains("Sorry, I cannot help"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_reads_as_unreachable_stage() {
        let err = StageError::new(Stage::Wish, StageFailure::Cancelled);
        assert_eq!(
            err.to_string(),
            "Stage 2 (Wish) could not be reached: cancelled"
        );
        assert!(err.is_cancelled());
    }
}
