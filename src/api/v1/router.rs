use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let coordinator = server.auth_coordinator.clone();

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(user_agent())
        .and(with(coordinator.clone()))
        .and_then(handler::register);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(user_agent())
        .and(with(coordinator.clone()))
        .and_then(handler::login);

    let refresh = warp::path("refresh")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(coordinator.clone()))
        .and_then(handler::refresh);

    let validate = warp::path("validate")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(coordinator.clone()))
        .and_then(handler::validate);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with(coordinator.clone()))
        .and_then(handler::logout);

    let logout_all = warp::path("logout-all")
        .and(warp::path::end())
        .and(warp::post())
        .and(bearer())
        .and(with(coordinator.clone()))
        .and_then(handler::logout_all);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_verification(coordinator.clone()))
        .and_then(handler::me);

    let oauth_session = warp::path!("oauth" / "session" / String)
        .and(warp::get())
        .and(with(coordinator.clone()))
        .and_then(handler::oauth_session);

    let oauth_link = warp::path!("oauth" / "link")
        .and(warp::post())
        .and(json_body())
        .and(with(coordinator))
        .and_then(handler::oauth_link);

    let oauth_callback = warp::path!("oauth" / String / "callback")
        .and(warp::get())
        .and(warp::query::<handler::CallbackQuery>())
        .and(with(server.oauth_flow.clone()))
        .and_then(handler::oauth_callback);

    let oauth_start = warp::path!("oauth" / String)
        .and(warp::get())
        .and(with(server.oauth_flow.clone()))
        .and_then(handler::oauth_start);

    register
        .or(login)
        .or(refresh)
        .or(validate)
        .or(logout)
        .or(logout_all)
        .or(me)
        .or(oauth_session)
        .or(oauth_link)
        .or(oauth_callback)
        .or(oauth_start)
}

/// `/api/v1` with error recovery, ready to serve.
pub fn api(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    warp::path("api")
        .and(warp::path("v1"))
        .and(routes(server))
        .recover(recover_error)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn user_agent() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::USER_AGENT.as_str())
}

fn bearer() -> impl Filter<Extract = (AccessToken,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        |header: Option<String>| async move {
            header
                .as_deref()
                .and_then(|h| h.strip_prefix("Bearer "))
                .filter(|t| !t.is_empty())
                .map(|t| AccessToken(t.to_string()))
                .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))
        },
    )
}

fn with_verification(
    coordinator: Arc<dyn AuthCoordinator>,
) -> impl Filter<Extract = (Subject,), Error = warp::Rejection> + Clone {
    bearer().and_then(move |token: AccessToken| {
        let coordinator = coordinator.clone();
        async move {
            match coordinator.validate_access(&token).await {
                AccessValidation::Valid(subject) => Ok(subject),
                AccessValidation::Invalid => Err(reject::custom(ApiErrorCode::InvalidToken)),
            }
        }
    })
}
