use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use crate::logger::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        debug!(error = %e, "malformed request body");
        ApiErrorCode::InvalidRequest
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        ApiErrorCode::InvalidRequest
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ApiErrorCode::InvalidRequest
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::MethodNotAllowed
    } else {
        warn!("unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Request is malformed or incomplete")]
    InvalidRequest,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Refresh token is not valid")]
    InvalidRefreshToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Account already exists")]
    SubjectExists,
    #[error("Account not found")]
    SubjectNotFound,
    #[error("Account selection expired or already used")]
    LinkSessionNotFound,
    #[error("Unknown sign-in provider")]
    UnknownProvider,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Identity service unavailable")]
    UpstreamUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidRefreshToken
            | ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::SubjectExists => StatusCode::CONFLICT,
            ApiErrorCode::SubjectNotFound
            | ApiErrorCode::LinkSessionNotFound
            | ApiErrorCode::UnknownProvider
            | ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Validation(e) => {
                debug!(reason = %e, "request rejected");
                ApiErrorCode::InvalidRequest
            }
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::InvalidRefreshToken => ApiErrorCode::InvalidRefreshToken,
            AuthError::InvalidToken => ApiErrorCode::InvalidToken,
            AuthError::SubjectExists => ApiErrorCode::SubjectExists,
            AuthError::SubjectNotFound => ApiErrorCode::SubjectNotFound,
            AuthError::LinkSessionNotFound => ApiErrorCode::LinkSessionNotFound,
            AuthError::UnknownProvider(_) => ApiErrorCode::UnknownProvider,
            AuthError::UpstreamUnavailable(e) => {
                warn!("identity service unavailable: {}", e);
                ApiErrorCode::UpstreamUnavailable
            }
            AuthError::Internal(e) => ApiErrorCode::internal(e),
        }
    }
}
