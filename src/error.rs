//! Error types for the search proxy.
//!
//! Every client-facing variant renders as a JSON body of the shape
//! `{"error": <label>, "message": <detail>}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Label used for every failed proxied request.
pub const REQUEST_ERROR_LABEL: &str = "Error en la petición";

/// Errors that can occur while proxying a search.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The `endpoint` query parameter is not one of `posts`, `pages`, `all`.
    #[error("Endpoint no válido: {0}")]
    InvalidEndpoint(String),

    /// Connection failure, timeout or unreadable body while talking to upstream.
    #[error("Error de transporte: {0}")]
    UpstreamTransport(String),

    /// Upstream answered with a status code >= 400.
    #[error("Error HTTP: {0}")]
    UpstreamHttp(u16),

    /// One of the sub-requests of an `all` search failed.
    #[error("Error en búsqueda global: {0}")]
    GlobalSearch(Box<ProxyError>),

    /// No upstream origin is configured and the request carries no host.
    #[error("No se pudo determinar el host de WordPress")]
    MissingHost,

    #[error("Solo se permiten peticiones GET")]
    MethodNotAllowed,

    /// Invalid startup configuration. Never rendered to clients.
    #[error("config error: {0}")]
    Config(String),
}

/// JSON body returned for every error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::GlobalSearch(inner) => inner.status(),
            Self::InvalidEndpoint(_)
            | Self::UpstreamTransport(_)
            | Self::UpstreamHttp(_)
            | Self::MissingHost => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label placed in the `error` field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Método no permitido",
            Self::Config(_) => "Error de configuración",
            _ => REQUEST_ERROR_LABEL,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.label().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
