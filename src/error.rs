use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::model::{RouteKind, TransportMode};

/// Failures surfaced to API clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidCoordinates(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    LocationNotFound(String),

    /// Reserved: an empty route list is currently answered with 200.
    #[error("{0}")]
    RouteNotFound(String),

    #[error("Endpoint not found: {0}")]
    NotFound(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Too many requests from this IP, please try again later.")]
    TooManyRequests,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCoordinates(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::LocationNotFound(_) | ApiError::RouteNotFound(_) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCoordinates(_) => "INVALID_COORDINATES",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::LocationNotFound(_) => "LOCATION_NOT_FOUND",
            ApiError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::TooManyRequests => "RATE_LIMIT_EXCEEDED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn user_message(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "請求參數錯誤，請檢查輸入資料",
            StatusCode::NOT_FOUND => "找不到請求的資源",
            StatusCode::PAYLOAD_TOO_LARGE => "請求內容過大",
            StatusCode::TOO_MANY_REQUESTS => "請求過於頻繁，請稍後再試",
            _ => "伺服器內部錯誤，請聯繫系統管理員",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    message: &'static str,
    timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
            message: self.user_message(),
            timestamp: crate::model::timestamp_now(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(format!("Validation error: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

/// Problems with the built-in tables, raised at startup.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to parse {table}: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("destination references unknown city '{0}'")]
    UnknownCity(String),

    #[error("duplicate station id '{0}'")]
    DuplicateStation(String),
}

/// Why a single route candidate could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error("no transport info for mode '{0}'")]
    MissingTransportInfo(TransportMode),

    #[error("{} route produced non-finite metrics", .0.as_str())]
    NonFiniteMetrics(RouteKind),
}
