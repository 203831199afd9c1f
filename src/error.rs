//! Error handler for eventgate.

use std::fmt::Display;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Enum representing gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body is not valid JSON, or not the shape the protocol requires.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// Handshake detected but `data.validationCode` is absent.
    #[error("validation event without `validationCode`")]
    MissingValidationCode,

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("project `{0}` not found")]
    ProjectNotFound(String),

    #[error("token does not match project")]
    Forbidden,

    #[error("failed to encode event")]
    Serialization(#[source] serde_json::Error),

    /// A collaborator (project or build store) failed.
    #[error("downstream failure, {details}")]
    Downstream {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl GatewayError {
    pub fn malformed(err: impl Display) -> Self {
        Self::MalformedBody(err.to_string())
    }

    /// Whether the failure is on the gateway side (5xx) rather than the input.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Downstream { .. } | Self::Serialization(_))
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::ProjectNotFound(id),
            err => Self::Downstream {
                details: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("Malformed body.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            GatewayError::UnsupportedEncoding(_) => response
                .title("Unsupported event encoding.")
                .status(StatusCode::UNSUPPORTED_MEDIA_TYPE),

            GatewayError::MissingValidationCode => {
                response.title("Invalid validation event.")
            },

            GatewayError::ProjectNotFound(_) => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            GatewayError::Forbidden => {
                response.title("Forbidden.").status(StatusCode::FORBIDDEN)
            },

            GatewayError::Serialization(err) => {
                tracing::error!(error = %err, "failed to encode event");

                ResponseError::default().details("Failed encoding.")
            },

            GatewayError::Downstream { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                ResponseError::default().details("Failed to invoke hook.")
            },

            GatewayError::MalformedBody(_) => response,
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
