use pickmirror_common::error::MirrorError;
use thiserror::Error;

use crate::client::ClientError;
use crate::mapper::MappingError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("record mapping error: {0}")]
    RecordMapping(#[from] MappingError),

    #[error("upsert error: {0}")]
    Upsert(String),

    #[error("invalid run id: {0}")]
    InvalidRunId(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error(transparent)]
    Storage(#[from] MirrorError),
}

impl SyncError {
    /// Caller input errors: rejected before any state is touched.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidRunId(_) | SyncError::UnknownEntityType(_)
        )
    }
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RateLimitExceeded { .. } => SyncError::RateLimitExceeded(err.to_string()),
            other => SyncError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_run_level_variants() {
        let throttled: SyncError = ClientError::RateLimitExceeded { retries: 3 }.into();
        assert!(matches!(throttled, SyncError::RateLimitExceeded(_)));

        let transport: SyncError = ClientError::Transport {
            attempts: 4,
            last_error: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(transport, SyncError::Transport(_)));
        assert!(transport.to_string().contains("connection refused"));

        let decode: SyncError = ClientError::Decode("not json".to_string()).into();
        assert!(matches!(decode, SyncError::Transport(_)));
    }

    #[test]
    fn only_input_errors_are_client_errors() {
        assert!(SyncError::InvalidRunId("x".to_string()).is_client_error());
        assert!(SyncError::UnknownEntityType("x".to_string()).is_client_error());
        assert!(!SyncError::Schema("x".to_string()).is_client_error());
    }
}
