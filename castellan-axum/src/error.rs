//! Maps every error this crate's handlers can produce onto the two wire
//! shapes: `{error, error_description}` for the OAuth2
//! surface, `{code, message, description}` for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use castellan_oauth2::OAuth2Error;
use castellan_oidc::OidcError;
use serde::Serialize;

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

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::OAuth2(err) => {
                let status = oauth2_status(&err);
                let body = OAuth2ErrorBody {
                    error: err.code(),
                    error_description: err.to_string(),
                };
                (status, Json(body)).into_response()
            }
            Self::Oidc(err) => {
                let status = match err {
                    OidcError::MissingBearerToken | OidcError::InvalidAccessToken => {
                        StatusCode::UNAUTHORIZED
                    }
                    OidcError::Pki(_) | OidcError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let body = ManagementErrorBody {
                    code: "oidc_error",
                    message: err.to_string(),
                    description: "request could not be completed".to_string(),
                };
                (status, Json(body)).into_response()
            }
            Self::Unauthorized => {
                let body = ManagementErrorBody {
                    code: "unauthorized",
                    message: "authentication required".to_string(),
                    description: "request could not be completed".to_string(),
                };
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            Self::Internal(cause) => {
                tracing::error!(error = %cause, "management-plane guard failed");
                let body = ManagementErrorBody {
                    code: "internal_error",
                    message: "internal server error".to_string(),
                    description: "request could not be completed".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

fn oauth2_status(err: &OAuth2Error) -> StatusCode {
    match err {
        OAuth2Error::InvalidClient(_) | OAuth2Error::UnauthorizedClient(_) => {
            StatusCode::UNAUTHORIZED
        }
        OAuth2Error::ServerError(_) | OAuth2Error::Token(_) | OAuth2Error::Store(_) | OAuth2Error::Encryption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}
