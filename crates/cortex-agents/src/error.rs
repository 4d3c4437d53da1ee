//! Agent-layer errors and their dispatcher classification.

use cortex_core::error::CoreError;
use cortex_core::models::task::ErrorClass;
use cortex_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("cancelled")]
    Cancelled,
}

impl AgentError {
    /// Map an execution failure onto the dispatcher's retry policy:
    /// provider `Unavailable`/`Timeout` are transient, cancellation is
    /// terminal, everything else is permanent.
    pub fn classify(&self) -> ErrorClass {
        match self {
            AgentError::Provider(p) if p.falls_back() => ErrorClass::Transient,
            AgentError::Cancelled => ErrorClass::Cancelled,
            _ => ErrorClass::Permanent,
        }
    }
}

impl From<AgentError> for CoreError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Provider(p) => p.into(),
            AgentError::InvalidPayload(msg) => CoreError::Validation {
                field: "payload".into(),
                message: msg,
            },
            AgentError::Cancelled => CoreError::Unavailable("cancelled".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_unavailable_is_transient() {
        let err = AgentError::Provider(ProviderError::Unavailable("down".into()));
        assert_eq!(err.classify(), ErrorClass::Transient);
        let err = AgentError::Provider(ProviderError::Timeout("slow".into()));
        assert_eq!(err.classify(), ErrorClass::Transient);
    }

    #[test]
    fn rejections_are_permanent() {
        let err = AgentError::Provider(ProviderError::Rejected("bad".into()));
        assert_eq!(err.classify(), ErrorClass::Permanent);
        let err = AgentError::Provider(ProviderError::Fatal("boom".into()));
        assert_eq!(err.classify(), ErrorClass::Permanent);
        let err = AgentError::InvalidPayload("missing field".into());
        assert_eq!(err.classify(), ErrorClass::Permanent);
    }

    #[test]
    fn cancellation_is_terminal() {
        assert_eq!(AgentError::Cancelled.classify(), ErrorClass::Cancelled);
    }
}
