use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use downstream::UpstreamFailure;
use serde_json::json;
use std::fmt;

pub const UPSTREAM_FAILURE_HEADER: &str = "x-upstream-failure";

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub headers: Option<HeaderMap>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: None,
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        let mut resp = (self.status, body).into_response();

        if let Some(headers) = self.headers {
            let headers_mut = resp.headers_mut();
            for (key, value) in headers.iter() {
                headers_mut.insert(key, value.clone());
            }
        }

        resp
    }
}

/// A failed dependency is always a 502, never a 500, so callers can tell it
/// apart from a bug in this service.
impl From<UpstreamFailure> for AppError {
    fn from(err: UpstreamFailure) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(kind) = HeaderValue::from_str(&err.kind.to_string()) {
            headers.insert(UPSTREAM_FAILURE_HEADER, kind);
        }
        AppError::bad_gateway(format!("service-a call failed: {}", err)).with_headers(headers)
    }
}

pub type AppResult<T> = Result<T, AppError>;
