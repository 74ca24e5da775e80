//! Runs against a live Redis when `TURNSTILE_TEST_REDIS_DSN` is set, e.g.
//! `TURNSTILE_TEST_REDIS_DSN=redis://127.0.0.1:6379 cargo test --test redis_tests`.

use redis::aio::ConnectionManager;
use turnstile::domain_model::*;
use turnstile::domain_port::*;
use turnstile::infra_redis::*;

async fn connect() -> Option<ConnectionManager> {
    let dsn = std::env::var("TURNSTILE_TEST_REDIS_DSN").ok()?;
    let client = redis::Client::open(dsn.as_str()).unwrap();
    Some(client.get_connection_manager().await.unwrap())
}

fn prefix(name: &str) -> String {
    format!("turnstile-test-{}-{}", name, nanoid::nanoid!(8))
}

#[tokio::test]
async fn session_delete_reports_only_the_first_removal() {
    let Some(conn) = connect().await else {
        return;
    };
    let store = RedisSessionStore::new(conn, prefix("session"));
    let subject_id = SubjectId::new_random();
    let a = SessionRecord::new(subject_id, "a@x.com", TokenId::generate(), None);
    let b = SessionRecord::new(subject_id, "a@x.com", TokenId::generate(), None);
    for r in [&a, &b] {
        store
            .put(subject_id, &r.refresh_token_id, r, 60)
            .await
            .unwrap();
    }

    assert_eq!(
        store.get(subject_id, &a.refresh_token_id).await.unwrap(),
        Some(a.clone())
    );
    assert_eq!(store.list_by_subject(subject_id).await.unwrap().len(), 2);

    assert!(store.delete(subject_id, &a.refresh_token_id).await.unwrap());
    assert!(!store.delete(subject_id, &a.refresh_token_id).await.unwrap());
    assert_eq!(store.list_by_subject(subject_id).await.unwrap(), vec![b.clone()]);

    store.delete(subject_id, &b.refresh_token_id).await.unwrap();
}

#[tokio::test]
async fn racing_session_deletes_have_one_winner() {
    let Some(conn) = connect().await else {
        return;
    };
    let store = RedisSessionStore::new(conn, prefix("race"));
    let subject_id = SubjectId::new_random();
    let record = SessionRecord::new(subject_id, "a@x.com", TokenId::generate(), None);
    store
        .put(subject_id, &record.refresh_token_id, &record, 60)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        store.delete(subject_id, &record.refresh_token_id),
        store.delete(subject_id, &record.refresh_token_id)
    );
    assert_eq!(
        [first.unwrap(), second.unwrap()]
            .iter()
            .filter(|removed| **removed)
            .count(),
        1
    );
}

#[tokio::test]
async fn revocations_and_link_sessions_round_trip() {
    let Some(conn) = connect().await else {
        return;
    };
    let revocations = RedisRevocationStore::new(conn.clone(), prefix("revoked"));
    let id = TokenId::generate();
    assert!(!revocations.is_revoked(&id).await.unwrap());
    revocations.revoke(&id, 60).await.unwrap();
    assert!(revocations.is_revoked(&id).await.unwrap());

    let links = RedisLinkSessionStore::new(conn, prefix("oauth"));
    let session_id = LinkSessionId::generate(chrono::Utc::now());
    let session = EphemeralLinkSession {
        email: "same@x.com".to_string(),
        provider: "github".to_string(),
        provider_id: "4242".to_string(),
        candidates: Vec::new(),
    };
    links.put(&session_id, &session, 60).await.unwrap();
    assert_eq!(links.get(&session_id).await.unwrap(), Some(session));
    assert!(links.remove(&session_id).await.unwrap());
    assert!(!links.remove(&session_id).await.unwrap());
    assert_eq!(links.get(&session_id).await.unwrap(), None);
}
