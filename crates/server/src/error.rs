//! Error taxonomy shared by every service and handler.
//!
//! Validation failures are returned to the caller as-is. Storage and signing
//! failures are logged where they happen and rendered as an opaque general error.

use crate::response::{ErrorBody, Output};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing parameter: {0}")]
    MissingParam(String),
    #[error("{field} exceeds {max} characters")]
    InvalidLength { field: String, max: usize },
    #[error("unable to parse: {0}")]
    Parse(String),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("email address already in use: {0}")]
    DuplicateEmail(String),
    #[error("email address and password combination not found")]
    EmailPasswordCombo,
    #[error("reset token is invalid or expired")]
    ResetTokenInvalid,
    #[error("login is not active")]
    LoginInactive,
    #[error("{0}")]
    PasswordValidation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("invalid code challenge method: {0}")]
    InvalidMethod(String),
    #[error("missing or unsupported Accept header")]
    MissingAcceptHeader,
    #[error("missing route: {0}")]
    MissingRoute(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("{0}")]
    General(String),
    #[error("storage error: {0}")]
    Db(#[from] DbErr),
}

impl ApiError {
    pub fn missing(param: impl Into<String>) -> Self {
        Self::MissingParam(param.into())
    }

    pub fn length(field: impl Into<String>, max: usize) -> Self {
        Self::InvalidLength {
            field: field.into(),
            max,
        }
    }

    pub fn general(detail: impl Into<String>) -> Self {
        Self::General(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Authorization(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParam(_)
            | ApiError::InvalidLength { .. }
            | ApiError::Parse(_)
            | ApiError::InvalidEmail(_)
            | ApiError::DuplicateEmail(_)
            | ApiError::ResetTokenInvalid
            | ApiError::PasswordValidation(_)
            | ApiError::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            ApiError::EmailPasswordCombo | ApiError::Authorization(_) => StatusCode::UNAUTHORIZED,
            ApiError::LoginInactive => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::MissingRoute(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MissingAcceptHeader => StatusCode::NOT_ACCEPTABLE,
            ApiError::General(_) | ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier clients can match on.
    pub fn id(&self) -> &'static str {
        match self {
            ApiError::MissingParam(_) => "missing_param",
            ApiError::InvalidLength { .. } => "invalid_length",
            ApiError::Parse(_) => "parse_error",
            ApiError::InvalidEmail(_) => "invalid_email",
            ApiError::DuplicateEmail(_) => "duplicate_email",
            ApiError::EmailPasswordCombo => "email_password_combo",
            ApiError::ResetTokenInvalid => "reset_token_invalid",
            ApiError::LoginInactive => "login_inactive",
            ApiError::PasswordValidation(_) => "password_validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidMethod(_) => "invalid_method",
            ApiError::MissingAcceptHeader => "missing_accept_header",
            ApiError::MissingRoute(_) => "missing_route",
            ApiError::Authorization(_) => "authorization",
            ApiError::General(_) | ApiError::Db(_) => "general",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ApiError::MissingParam(_) => "Missing Parameter",
            ApiError::InvalidLength { .. } => "Invalid Length",
            ApiError::Parse(_) => "Parse Error",
            ApiError::InvalidEmail(_) => "Invalid Email",
            ApiError::DuplicateEmail(_) => "Duplicate Email",
            ApiError::EmailPasswordCombo => "Email/Password Combination",
            ApiError::ResetTokenInvalid => "Reset Token Invalid",
            ApiError::LoginInactive => "Login Inactive",
            ApiError::PasswordValidation(_) => "Password Validation",
            ApiError::NotFound(_) => "No Results Error",
            ApiError::Conflict(_) => "Conflict",
            ApiError::InvalidMethod(_) => "Invalid Method",
            ApiError::MissingAcceptHeader => "Missing Accept Header",
            ApiError::MissingRoute(_) => "Missing Route",
            ApiError::Authorization(_) => "Authorization Error",
            ApiError::General(_) | ApiError::Db(_) => "General Error",
        }
    }

    /// Client-facing detail. Storage failures never leak their cause.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Db(_) => "unable to complete the request".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Db(e) = &self {
            tracing::error!(
                name = "api.error.db",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = ?e,
                message = "storage failure"
            );
        }
        let body = Output::<()>::failure(ErrorBody {
            id: self.id().to_string(),
            title: self.title().to_string(),
            detail: self.detail(),
            status: status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
