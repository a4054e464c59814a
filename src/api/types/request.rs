use bon::Builder;
use serde::Serialize;

/// Number of changes per category the dashboard asks for by default.
pub const DEFAULT_CHANGES_LIMIT: u32 = 5;

/// Request for the `/changes` endpoint.
///
/// # Example
///
/// ```
/// use leaderboard_live::api::types::request::ChangesRequest;
///
/// let request = ChangesRequest::builder().limit(10).time_range("24h").build();
/// assert_eq!(request.limit, 10);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct ChangesRequest {
    /// Maximum entries per category
    #[builder(default = DEFAULT_CHANGES_LIMIT)]
    pub limit: u32,
    /// Window to summarise, passed through to the server (e.g. `24h`, `7d`)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub time_range: Option<String>,
}

impl Default for ChangesRequest {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToQueryParams as _;

    #[test]
    fn default_limit_is_five() {
        assert_eq!(ChangesRequest::default().query_params(None), "?limit=5");
    }

    #[test]
    fn time_range_serializes_camel_case() {
        let request = ChangesRequest::builder().limit(3).time_range("7d").build();

        assert_eq!(request.query_params(None), "?limit=3&timeRange=7d");
    }
}
