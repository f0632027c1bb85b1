use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{file_parsers::ParseError, wind::Provider};

/// The fix series cannot be enriched at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("No points provided")]
    NoFixes,

    #[error("No valid timestamps in points")]
    NoValidTimestamps,

    #[error("No valid lat/lon coordinates in points")]
    NoValidCoordinates,
}

/// Structural problems in a provider's hourly payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataQualityError {
    #[error("hourly payload missing")]
    MissingHourly,

    #[error("hourly array `{0}` missing or empty")]
    MissingArray(&'static str),

    #[error("hourly arrays inconsistent (time={time}, speed={speed}, direction={direction})")]
    LengthMismatch {
        time: usize,
        speed: usize,
        direction: usize,
    },

    #[error("hourly series empty after parsing")]
    NoValidSamples,

    #[error("hourly payload malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Transport { provider: Provider, message: String },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: Provider, status: u16 },

    #[error("{provider} returned unusable hourly data: {reason}")]
    Unusable {
        provider: Provider,
        reason: DataQualityError,
    },

    #[error("no usable hourly wind data ({primary}; fallback: {fallback})")]
    Exhausted {
        primary: Box<ProviderError>,
        fallback: Box<ProviderError>,
    },
}

impl ProviderError {
    /// The provider that failed last.
    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::Transport { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Unusable { provider, .. } => *provider,
            ProviderError::Exhausted { fallback, .. } => fallback.provider(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("wind mapping worker stopped before finishing")]
    WorkerLost,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("File parsing error: {0}")]
    FileParsing(#[from] ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Wind provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Internal server error")]
    Internal,
}

impl From<InputError> for AppError {
    fn from(err: InputError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<EnrichError> for AppError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::Input(e) => e.into(),
            EnrichError::Provider(e) => e.into(),
            EnrichError::WorkerLost => {
                error!("Wind mapping worker stopped before finishing");
                AppError::Internal
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::FileParsing(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Provider(e) => {
                error!("Wind provider error: {e}");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
