use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::Result;
use crate::error::Error;

/// Envelope wrapping every API response: `{ "success": bool, "data": T, "error"?: string }`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Absent for endpoints that only acknowledge, such as `/scrape`
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Fail with a [`Kind::Status`](crate::error::Kind::Status) error when the
    /// server reported `success: false`.
    pub fn ensure_success(&self, method: &Method, path: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }

        let message = self
            .error
            .clone()
            .unwrap_or_else(|| "request was not successful".to_owned());

        #[cfg(feature = "tracing")]
        tracing::warn!(method = %method, path = %path, message = %message, "API reported failure");

        Err(Error::status(
            StatusCode::OK,
            method.clone(),
            path.to_owned(),
            message,
        ))
    }

    /// Unwrap the payload of a successful response.
    pub fn into_data(self, method: &Method, path: &str) -> Result<T> {
        self.ensure_success(method, path)?;

        self.data.ok_or_else(|| {
            Error::status(
                StatusCode::OK,
                method.clone(),
                path.to_owned(),
                "response carried no data",
            )
        })
    }
}
