use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::gateway::GatewayError;
use crate::SelectionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Invalid request: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
        GatewayError::OrderNotFound => StatusCode::NOT_FOUND,
        GatewayError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Malformed(_) => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::SubmissionInProgress | CheckoutError::NoOrderSelected => StatusCode::CONFLICT,
                CheckoutError::UnknownOrder(_) => StatusCode::NOT_FOUND,
                CheckoutError::Gateway(e) => gateway_status(e),
            },
            Self::Gateway(e) => gateway_status(e),
            Self::Selection(SelectionError::ProductNotFound) => StatusCode::NOT_FOUND,
            Self::Selection(_) | Self::Invalid(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        }

        let body = match &self {
            Self::Checkout(CheckoutError::Validation(fields)) => json!({ "error": self.to_string(), "fields": fields }),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => json!({ "error": "Internal server error" }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
