use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;

use crate::models::Collection;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Email not confirmed")]
    EmailNotConfirmed,
    #[error("User already registered")]
    AlreadyRegistered,
    #[error("Password should be at least {0} characters")]
    WeakPassword(usize),
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Too many requests")]
    TooManyRequests,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("movie is already in {0}")]
    AlreadyExists(Collection),
    #[error("sign in required")]
    Unauthorized,
    #[error("admin access required")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Other(anyhow::Error::new(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(anyhow::Error::new(err))
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Other(anyhow::anyhow!("password hashing failed: {err}"))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::InvalidCredentials | AuthError::EmailNotConfirmed) => {
                StatusCode::UNAUTHORIZED
            },
            AppError::Auth(AuthError::AlreadyRegistered) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::TooManyRequests) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Auth(_) => StatusCode::BAD_REQUEST,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::Invalid(_) => "invalid",
            AppError::Auth(_) => "auth",
            AppError::Other(_) => "internal",
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AlreadyExists(Collection::Favorites) => {
                "This movie is already in your favorites.".to_string()
            },
            AppError::AlreadyExists(Collection::Watchlist) => {
                "This movie is already in your watchlist.".to_string()
            },
            AppError::Unauthorized => "Please sign in first.".to_string(),
            AppError::Forbidden => "You do not have access to this page.".to_string(),
            AppError::NotFound => "Nothing here.".to_string(),
            AppError::Invalid(msg) => msg.clone(),
            AppError::Auth(err) => friendly_message(&err.to_string()).to_string(),
            AppError::Other(err) => friendly_message(&format!("{err:#}")).to_string(),
        }
    }

    pub(crate) fn log(&self) {
        if let AppError::Other(err) = self {
            tracing::error!(error = ?err, "request failed");
        }
    }
}

/// Best-effort readable text for raw auth and storage error messages.
pub fn friendly_message(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("invalid login credentials") {
        "Wrong email or password. Please try again."
    } else if lower.contains("email not confirmed") {
        "Your email is not confirmed yet."
    } else if lower.contains("too many requests") {
        "Too many attempts. Please wait a moment."
    } else if lower.contains("user already registered") {
        "This email is already registered. Try signing in."
    } else if lower.contains("password should be at least") {
        "Password is too short."
    } else if lower.contains("invalid email") {
        "Email format is invalid."
    } else if lower.contains("database is locked") || lower.contains("busy") {
        "The service is busy. Please try again."
    } else if lower.contains("no such table") {
        "The database is not initialized."
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "The request timed out. Please try again."
    } else if lower.contains("connection") || lower.contains("connect") {
        "Could not reach the service. Please try again."
    } else {
        "Something went wrong. Please try again."
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let body = crate::templates::error_page(self.user_message());
        (self.status(), Html(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Same errors rendered as JSON for the `/api` routes.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ApiErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();
        let body = ApiErrorBody { error: self.0.code(), message: self.0.user_message() };
        (self.0.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_readable_text() {
        let err = AppError::from(AuthError::InvalidCredentials);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Wrong email or password. Please try again.");

        let err = AppError::from(AuthError::WeakPassword(6));
        assert_eq!(err.user_message(), "Password is too short.");
    }

    #[test]
    fn raw_storage_errors_are_matched_by_text() {
        assert_eq!(
            friendly_message("Execution Error: database is locked"),
            "The service is busy. Please try again."
        );
        assert_eq!(friendly_message("no such table: favorites"), "The database is not initialized.");
        assert_eq!(friendly_message("weird"), "Something went wrong. Please try again.");
    }

    #[test]
    fn duplicate_is_a_conflict() {
        let err = AppError::AlreadyExists(Collection::Watchlist);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "already_exists");
        assert!(err.user_message().contains("watchlist"));
    }
}
