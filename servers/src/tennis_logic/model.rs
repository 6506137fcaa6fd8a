use chrono::Utc;
use chrono_tz::US::Eastern;
use serde::Serialize;
use serde_json::Value;

/// Body of `GET /api/tennis`.
#[derive(Debug, Clone, Serialize)]
pub struct MatchesResponse<'a> {
    pub timestamp: String,
    pub matches: &'a [Value],
}

impl<'a> MatchesResponse<'a> {
    pub fn now(matches: &'a [Value]) -> Self {
        Self {
            timestamp: eastern_timestamp(),
            matches,
        }
    }
}

/// Error body, e.g. `{"detail": "Match not found"}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

/// Current time in US/Eastern as RFC 3339.
pub fn eastern_timestamp() -> String {
    Utc::now().with_timezone(&Eastern).to_rfc3339()
}
