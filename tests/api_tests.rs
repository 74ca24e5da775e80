mod common;

use common::*;
use serde_json::{Value, json};
use std::collections::HashMap;
use turnstile::api;
use turnstile::domain_model::*;
use url::Url;
use warp::http::StatusCode;

fn body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

async fn post(app: &TestApp, path: &str, payload: Value) -> warp::http::Response<warp::hyper::body::Bytes> {
    warp::test::request()
        .method("POST")
        .path(path)
        .json(&payload)
        .reply(&api::v1::api(app.server.clone()))
        .await
}

async fn get(app: &TestApp, path: &str, bearer: Option<&str>) -> warp::http::Response<warp::hyper::body::Bytes> {
    let mut request = warp::test::request().method("GET").path(path);
    if let Some(token) = bearer {
        request = request.header("authorization", format!("Bearer {}", token));
    }
    request.reply(&api::v1::api(app.server.clone())).await
}

fn location(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Url {
    let header = res.headers()["location"].to_str().unwrap();
    Url::parse(header).unwrap()
}

fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn register_then_validate_returns_the_subject() {
    let app = app();
    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/register")
        .header("user-agent", "integration/1.0")
        .json(&json!({ "email": "a@x.com", "username": "a", "password": PASSWORD }))
        .reply(&api::v1::api(app.server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let registered = body(&res);
    assert_eq!(registered["success"], true);
    assert_eq!(registered["data"]["user"]["email"], "a@x.com");

    let access = registered["data"]["tokens"]["accessToken"].as_str().unwrap();
    let res = post(&app, "/api/v1/validate", json!({ "accessToken": access })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let validated = body(&res);
    assert_eq!(validated["data"]["valid"], true);
    assert_eq!(validated["data"]["user"]["email"], "a@x.com");
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let app = app();
    app.register("a@x.com", "a").await;

    let res = post(
        &app,
        "/api/v1/register",
        json!({ "email": "a@x.com", "username": "a", "password": PASSWORD }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body(&res)["error"]["code"], "SubjectExists");

    for payload in [
        json!({ "email": "nope", "username": "b", "password": PASSWORD }),
        json!({ "email": "b@x.com", "password": PASSWORD }),
        json!({ "email": "b@x.com", "username": "b", "password": "short" }),
    ] {
        let res = post(&app, "/api/v1/register", payload).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/register")
        .header("content-type", "application/json")
        .body("{ not json")
        .reply(&api::v1::api(app.server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let app = app();
    app.register("a@x.com", "a").await;

    for (identifier, password) in [("a", "wrong-pass"), ("ghost@x.com", PASSWORD)] {
        let res = post(
            &app,
            "/api/v1/login",
            json!({ "identifier": identifier, "password": password }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&res)["error"]["code"], "InvalidCredentials");
    }

    let res = post(&app, "/api/v1/login", json!({ "email": "a@x.com", "password": PASSWORD })).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn identity_outage_is_a_503() {
    let app = app();
    app.register("a@x.com", "a").await;
    app.identity.set_unavailable(true);

    let res = post(&app, "/api/v1/login", json!({ "identifier": "a", "password": PASSWORD })).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let app = app();
    let rt0 = app.register("a@x.com", "a").await.tokens.refresh_token.0;

    let res = post(&app, "/api/v1/refresh", json!({ "refreshToken": rt0 })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let rt1 = body(&res)["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rt0, rt1);

    let res = post(&app, "/api/v1/refresh", json!({ "refreshToken": rt0 })).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&res)["error"]["code"], "InvalidRefreshToken");

    let res = post(&app, "/api/v1/refresh", json!({ "refreshToken": rt1 })).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = post(&app, "/api/v1/refresh", json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_for_a_deleted_subject_is_a_404() {
    let app = app();
    let response = app.register("a@x.com", "a").await;
    app.identity.remove(response.user.id);

    let res = post(
        &app,
        "/api/v1/refresh",
        json!({ "refreshToken": response.tokens.refresh_token.0 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_always_succeeds_and_ends_the_session() {
    let app = app();
    let rt = app.register("a@x.com", "a").await.tokens.refresh_token.0;

    for _ in 0..2 {
        let res = post(&app, "/api/v1/logout", json!({ "refreshToken": rt })).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["success"], true);
    }
    let res = post(&app, "/api/v1/refresh", json!({ "refreshToken": rt })).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    for payload in ["", "garbage", r#"{"refreshToken":"x.y.z"}"#] {
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/logout")
            .body(payload)
            .reply(&api::v1::api(app.server.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn validate_reports_invalid_tokens_without_erroring() {
    let app = app();
    let response = app.register("a@x.com", "a").await;
    let expired = app.expired_pair(&response.user);

    for token in ["junk", expired.access_token.0.as_str(), response.tokens.refresh_token.0.as_str()] {
        let res = post(&app, "/api/v1/validate", json!({ "accessToken": token })).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&res)["data"]["valid"], false);
    }

    let res = post(&app, "/api/v1/validate", json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_requires_a_live_access_token() {
    let app = app();
    let response = app.register("a@x.com", "a").await;

    let res = get(&app, "/api/v1/me", Some(&response.tokens.access_token.0)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["data"]["user"]["username"], "a");

    let res = get(&app, "/api/v1/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let expired = app.expired_pair(&response.user);
    let res = get(&app, "/api/v1/me", Some(&expired.access_token.0)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_all_closes_every_device() {
    let app = app();
    let first = app.register("a@x.com", "a").await;
    let res = post(&app, "/api/v1/login", json!({ "identifier": "a", "password": PASSWORD })).await;
    let second_rt = body(&res)["data"]["tokens"]["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/logout-all")
        .header("authorization", format!("Bearer {}", first.tokens.access_token.0))
        .reply(&api::v1::api(app.server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["data"]["closed"], 2);

    for rt in [first.tokens.refresh_token.0, second_rt] {
        let res = post(&app, "/api/v1/refresh", json!({ "refreshToken": rt })).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    let res = warp::test::request()
        .method("POST")
        .path("/api/v1/logout-all")
        .reply(&api::v1::api(app.server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let app = app();
    let res = get(&app, "/api/v1/nowhere", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = get(&app, "/api/v1/oauth/unknown", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res)["error"]["code"], "UnknownProvider");
}

async fn oauth_callback(app: &TestApp, code: &str) -> Url {
    let res = get(app, "/api/v1/oauth/fake", None).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let state = query(&location(&res)).remove("state").unwrap();

    let res = get(
        app,
        &format!("/api/v1/oauth/fake/callback?code={}&state={}", code, state),
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    location(&res)
}

#[tokio::test]
async fn oauth_login_redirects_with_tokens() {
    let app = app();
    let landing = oauth_callback(&app, "good-code").await;
    assert_eq!(landing.host_str(), Some("app.test"));

    let access = query(&landing).remove("accessToken").unwrap();
    let res = get(&app, "/api/v1/me", Some(&access)).await;
    assert_eq!(body(&res)["data"]["user"]["email"], "oauth@x.com");
}

#[tokio::test]
async fn oauth_failures_redirect_with_an_error() {
    let app = app();
    let landing = oauth_callback(&app, "bad-code").await;
    assert_eq!(query(&landing)["error"], "provider_error");

    let res = get(&app, "/api/v1/oauth/fake/callback?code=good-code&state=forged", None).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(query(&location(&res))["error"], "invalid_state");

    app.provider
        .set_profile(json!({ "sub": "p-2", "email": "u@x.com", "email_verified": false }));
    let landing = oauth_callback(&app, "good-code").await;
    assert_eq!(query(&landing)["error"], "unverified_email");
}

#[tokio::test]
async fn ambiguous_oauth_identity_is_linked_exactly_once() {
    let app = app();
    for username in ["work", "home"] {
        app.identity
            .insert(
                Subject {
                    id: SubjectId::new_random(),
                    email: "oauth@x.com".to_string(),
                    username: username.to_string(),
                },
                None,
            )
            .unwrap();
    }

    let landing = oauth_callback(&app, "good-code").await;
    let q = query(&landing);
    assert_eq!(q["selectAccount"], "true");
    let session_id = q["sessionId"].clone();

    let res = get(&app, &format!("/api/v1/oauth/session/{}", session_id), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let candidates = body(&res)["data"]["candidates"].as_array().unwrap().clone();
    assert_eq!(candidates.len(), 2);
    let chosen = candidates[0]["id"].as_str().unwrap().to_string();

    let link = json!({ "sessionId": session_id, "subjectId": chosen });
    let res = post(&app, "/api/v1/oauth/link", link.clone()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["data"]["user"]["id"], chosen.as_str());

    let res = post(&app, "/api/v1/oauth/link", link).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = get(&app, &format!("/api/v1/oauth/session/{}", session_id), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = post(
        &app,
        "/api/v1/oauth/link",
        json!({ "sessionId": "missing", "subjectId": "not-a-uuid" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
