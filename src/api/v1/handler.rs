use super::error::*;
use crate::application_impl::{CallbackParams, OAuthFlow};
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::{StatusCode, Uri};
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), warp::Rejection> {
    if value.trim().is_empty() {
        debug!(field, "required field missing");
        return Err(reject::custom(ApiErrorCode::InvalidRequest));
    }
    Ok(())
}

fn redirect_to(url: url::Url) -> Result<impl warp::Reply, warp::Rejection> {
    let uri: Uri = url
        .as_str()
        .parse()
        .map_err(ApiErrorCode::internal)
        .map_err(reject::custom)?;
    Ok(warp::redirect::found(uri))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub async fn register(
    body: RegisterRequest,
    user_agent: Option<String>,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    require("email", &body.email)?;
    require("username", &body.username)?;
    require("password", &body.password)?;

    let response = coordinator
        .register(RegisterInput {
            email: body.email,
            username: body.username,
            password: body.password,
            device_info: user_agent,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok(response)),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    user_agent: Option<String>,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    require("identifier", &body.identifier)?;
    require("password", &body.password)?;

    let response = coordinator
        .login(LoginInput {
            identifier: body.identifier,
            password: body.password,
            device_info: user_agent,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    require("refreshToken", &body.refresh_token)?;

    let tokens = coordinator
        .refresh(&RefreshToken(body.refresh_token))
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Subject>,
}

pub async fn validate(
    body: ValidateRequest,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    require("accessToken", &body.access_token)?;

    let reply = match coordinator
        .validate_access(&AccessToken(body.access_token))
        .await
    {
        AccessValidation::Valid(user) => warp::reply::with_status(
            warp::reply::json(&ApiResponse::ok(ValidateResponse {
                valid: true,
                user: Some(user),
            })),
            StatusCode::OK,
        ),
        AccessValidation::Invalid => {
            let code = ApiErrorCode::InvalidToken;
            let response = ApiResponse {
                success: false,
                data: Some(ValidateResponse {
                    valid: false,
                    user: None,
                }),
                error: Some(ApiError {
                    code,
                    message: code.to_string(),
                }),
            };
            warp::reply::with_status(warp::reply::json(&response), code.status())
        }
    };
    Ok(reply)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse;

/// Any body is accepted; the outcome is the same either way.
pub async fn logout(
    body: warp::hyper::body::Bytes,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let request: RefreshRequest = serde_json::from_slice(&body).unwrap_or_default();
    if !request.refresh_token.is_empty() {
        coordinator
            .logout(&RefreshToken(request.refresh_token))
            .await;
    }
    Ok(warp::reply::json(&ApiResponse::ok(LogoutResponse)))
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub closed: usize,
}

pub async fn logout_all(
    access_token: AccessToken,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let closed = coordinator
        .logout_all(&access_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(LogoutAllResponse {
        closed,
    })))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Subject,
}

pub async fn me(user: Subject) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(MeResponse { user })))
}

pub async fn oauth_start(
    provider: String,
    oauth_flow: Arc<OAuthFlow>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let url = oauth_flow
        .authorization_url(&provider)
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;
    redirect_to(url)
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn oauth_callback(
    provider: String,
    query: CallbackQuery,
    oauth_flow: Arc<OAuthFlow>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let url = oauth_flow
        .callback(
            &provider,
            CallbackParams {
                code: query.code,
                state: query.state,
                error: query.error,
            },
        )
        .await;
    redirect_to(url)
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub email: String,
    pub provider: String,
    pub candidates: Vec<Subject>,
}

pub async fn oauth_session(
    session_id: String,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = coordinator
        .oauth_candidates(&LinkSessionId(session_id))
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(CandidatesResponse {
        email: session.email,
        provider: session.provider,
        candidates: session.candidates,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkRequest {
    pub session_id: String,
    pub subject_id: String,
}

pub async fn oauth_link(
    body: LinkRequest,
    coordinator: Arc<dyn AuthCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    require("sessionId", &body.session_id)?;
    let subject_id: SubjectId = body
        .subject_id
        .parse()
        .map_err(|_| reject::custom(ApiErrorCode::InvalidRequest))?;

    let response = coordinator
        .select_oauth_account(&LinkSessionId(body.session_id), subject_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(response)))
}
