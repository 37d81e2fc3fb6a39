//! Maps every error this crate's handlers can produce onto the two wire
//! shapes: `{error, error_description}` for the OAuth2
//! surface, `{code, message, description}` for everything else.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use castellan_oauth2::OAuth2Error;
use castellan_oidc::OidcError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
struct OAuth2ErrorBody {
    error: &'static str,
    error_description: String,
}

#[derive(Debug, Serialize)]
struct ManagementErrorBody {
    code: &'static str,
    message: String,
    description: String,
}

#[derive(Debug)]
pub enum ApiError {
    OAuth2(OAuth2Error),
    Oidc(OidcError),
    /// A `Guard` extractor found no valid bearer token for a management-plane
    /// endpoint.
    Unauthorized,
    /// A guard or server-internal failure unrelated to the request itself.
    Internal(String),
}

impl From<OAuth2Error> for ApiError {
    fn from(value: OAuth2Error) -> Self {
        Self::OAuth2(value)
    }
}

impl From<OidcError> for ApiError {
    fn from(value: OidcError) -> Self {
        Self::Oidc(value)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth2(err) => write!(f, "{err}"),
            Self::Oidc(err) => write!(f, "{err}"),
            Self::Unauthorized => write!(f, "authentication required"),
            Self::Internal(cause) => write!(f, "internal error: {cause}"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::OAuth2(err) => oauth2_status(err),
            Self::Oidc(OidcError::MissingBearerToken) | Self::Oidc(OidcError::InvalidAccessToken) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Oidc(OidcError::Pki(_)) | Self::Oidc(OidcError::Token(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::OAuth2(err) => HttpResponse::build(self.status_code()).json(OAuth2ErrorBody {
                error: err.code(),
                error_description: err.to_string(),
            }),
            Self::Oidc(err) => HttpResponse::build(self.status_code()).json(ManagementErrorBody {
                code: "oidc_error",
                message: err.to_string(),
                description: "request could not be completed".to_string(),
            }),
            Self::Unauthorized => HttpResponse::build(self.status_code()).json(ManagementErrorBody {
                code: "unauthorized",
                message: "authentication required".to_string(),
                description: "request could not be completed".to_string(),
            }),
            Self::Internal(cause) => {
                tracing::error!(error = %cause, "management-plane guard failed");
                HttpResponse::build(self.status_code()).json(ManagementErrorBody {
                    code: "internal_error",
                    message: "internal server error".to_string(),
                    description: "request could not be completed".to_string(),
                })
            }
        }
    }
}

fn oauth2_status(err: &OAuth2Error) -> StatusCode {
    match err {
        OAuth2Error::InvalidClient(_) | OAuth2Error::UnauthorizedClient(_) => StatusCode::UNAUTHORIZED,
        OAuth2Error::ServerError(_) | OAuth2Error::Token(_) | OAuth2Error::Store(_) | OAuth2Error::Encryption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}
