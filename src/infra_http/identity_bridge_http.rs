use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Identity Bridge backed by the user service's internal HTTP API.
#[derive(Clone)]
pub struct HttpIdentityBridge {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    subjects: Vec<Subject>,
}

impl HttpIdentityBridge {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(e: reqwest::Error) -> IdentityError {
    IdentityError::Unavailable(e.to_string())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, IdentityError> {
    response
        .json::<T>()
        .await
        .map_err(|e| IdentityError::Internal(format!("unreadable response: {}", e)))
}

/// Maps statuses that mean the same thing on every endpoint.
async fn unexpected(response: Response) -> IdentityError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        IdentityError::Unavailable(format!("{} - {}", status, body))
    } else {
        IdentityError::Internal(format!("unexpected status {} - {}", status, body))
    }
}

#[async_trait::async_trait]
impl IdentityBridge for HttpIdentityBridge {
    async fn create_subject(&self, subject: &NewSubject) -> Result<Subject, IdentityError> {
        let response = self
            .client
            .post(self.url("/subjects"))
            .json(&json!({
                "email": subject.email,
                "username": subject.username,
                "password": subject.password,
            }))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => read_json(response).await,
            StatusCode::CONFLICT => Err(IdentityError::Conflict),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(IdentityError::Rejected(body))
            }
            _ => Err(unexpected(response).await),
        }
    }

    async fn verify_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<Subject>, IdentityError> {
        let response = self
            .client
            .post(self.url("/credentials/verify"))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => read_json(response).await.map(Some),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(response).await),
        }
    }

    async fn resolve_oauth_identity(
        &self,
        identity: &OAuthIdentity,
    ) -> Result<Vec<Subject>, IdentityError> {
        let response = self
            .client
            .post(self.url("/oauth/resolve"))
            .json(identity)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => {
                let resolved: ResolveResponse = read_json(response).await?;
                Ok(resolved.subjects)
            }
            _ => Err(unexpected(response).await),
        }
    }
}

#[async_trait::async_trait]
impl SubjectDirectory for HttpIdentityBridge {
    async fn find_subject(&self, subject_id: SubjectId) -> Result<Option<Subject>, IdentityError> {
        let response = self
            .client
            .get(self.url(&format!("/subjects/{}", subject_id)))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => read_json(response).await.map(Some),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            _ => Err(unexpected(response).await),
        }
    }

    async fn link_oauth_identity(
        &self,
        subject_id: SubjectId,
        identity: &OAuthIdentity,
    ) -> Result<Subject, IdentityError> {
        let response = self
            .client
            .post(self.url(&format!("/subjects/{}/oauth", subject_id)))
            .json(identity)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => read_json(response).await,
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound),
            StatusCode::CONFLICT => Err(IdentityError::Conflict),
            _ => Err(unexpected(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use warp::Filter;
    use warp::http::StatusCode as WarpStatus;

    fn alice() -> Subject {
        Subject {
            id: "6f1c1a4e-7d7a-4b8e-9a59-3c1f1f0b2a10".parse().unwrap(),
            email: "alice@x.com".to_string(),
            username: "alice".to_string(),
        }
    }

    /// Stand-in user service: `taken` is the only registered username,
    /// `alice` / `secret1` the only valid credentials.
    fn spawn_user_service() -> SocketAddr {
        let create = warp::post()
            .and(warp::path!("subjects"))
            .and(warp::body::json())
            .map(|body: serde_json::Value| {
                if body["username"] == "taken" {
                    warp::reply::with_status(warp::reply::json(&json!({})), WarpStatus::CONFLICT)
                } else if body["password"].as_str().unwrap_or("").len() < 6 {
                    warp::reply::with_status(
                        warp::reply::json(&json!({"error": "weak password"})),
                        WarpStatus::BAD_REQUEST,
                    )
                } else {
                    warp::reply::with_status(warp::reply::json(&alice()), WarpStatus::CREATED)
                }
            });
        let verify = warp::post()
            .and(warp::path!("credentials" / "verify"))
            .and(warp::body::json())
            .map(|body: serde_json::Value| {
                if body["identifier"] == "alice" && body["password"] == "secret1" {
                    warp::reply::with_status(warp::reply::json(&alice()), WarpStatus::OK)
                } else {
                    warp::reply::with_status(
                        warp::reply::json(&json!({})),
                        WarpStatus::UNAUTHORIZED,
                    )
                }
            });
        let find = warp::get()
            .and(warp::path!("subjects" / String))
            .map(|id: String| {
                if id == alice().id.to_string() {
                    warp::reply::with_status(warp::reply::json(&alice()), WarpStatus::OK)
                } else if id == uuid::Uuid::nil().to_string() {
                    warp::reply::with_status(
                        warp::reply::json(&json!({})),
                        WarpStatus::SERVICE_UNAVAILABLE,
                    )
                } else {
                    warp::reply::with_status(warp::reply::json(&json!({})), WarpStatus::NOT_FOUND)
                }
            });

        let (addr, server) =
            warp::serve(create.or(verify).or(find)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn bridge(addr: SocketAddr) -> HttpIdentityBridge {
        HttpIdentityBridge::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
    }

    fn new_subject(username: &str, password: &str) -> NewSubject {
        NewSubject {
            email: format!("{}@x.com", username),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn create_maps_statuses() {
        let bridge = bridge(spawn_user_service());

        let created = bridge.create_subject(&new_subject("alice", "secret1")).await;
        assert_eq!(created.unwrap(), alice());

        let taken = bridge.create_subject(&new_subject("taken", "secret1")).await;
        assert!(matches!(taken, Err(IdentityError::Conflict)));

        let weak = bridge.create_subject(&new_subject("bob", "1")).await;
        assert!(matches!(weak, Err(IdentityError::Rejected(_))));
    }

    #[tokio::test]
    async fn rejected_credentials_are_none() {
        let bridge = bridge(spawn_user_service());
        assert_eq!(
            bridge.verify_credentials("alice", "secret1").await.unwrap(),
            Some(alice())
        );
        assert_eq!(bridge.verify_credentials("alice", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lookups_distinguish_missing_from_down() {
        let bridge = bridge(spawn_user_service());
        assert_eq!(bridge.find_subject(alice().id).await.unwrap(), Some(alice()));
        assert_eq!(
            bridge.find_subject(SubjectId::new_random()).await.unwrap(),
            None
        );
        assert!(matches!(
            bridge.find_subject(SubjectId(uuid::Uuid::nil())).await,
            Err(IdentityError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let bridge = bridge(addr);
        assert!(matches!(
            bridge.verify_credentials("alice", "secret1").await,
            Err(IdentityError::Unavailable(_))
        ));
    }
}
