use axum::body::Bytes;
use pickmirror_common::error::MirrorError;
use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const MAX_HISTORY_LIMIT: i64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub full: bool,
}

impl SyncRequest {
    /// An empty body means an incremental sync.
    pub fn from_body(body: &Bytes) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| MirrorError::Validation(format!("invalid request body: {e}")).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_defaults_to_incremental() {
        assert!(!SyncRequest::from_body(&Bytes::new()).ok().unwrap().full);
        assert!(!SyncRequest::from_body(&Bytes::from_static(b"{}")).ok().unwrap().full);
        assert!(
            SyncRequest::from_body(&Bytes::from_static(br#"{"full":true}"#))
                .ok()
                .unwrap()
                .full
        );
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(SyncRequest::from_body(&Bytes::from_static(b"{full")).is_err());
    }

    #[test]
    fn history_limit_is_bounded() {
        assert_eq!(HistoryQuery { limit: None }.effective_limit(), 100);
        assert_eq!(HistoryQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(HistoryQuery { limit: Some(5000) }.effective_limit(), 1000);
        assert_eq!(HistoryQuery { limit: Some(25) }.effective_limit(), 25);
    }
}
