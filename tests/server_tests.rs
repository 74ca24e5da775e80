use turnstile::application_port::*;
use turnstile::server::Server;
use turnstile::settings::parse_settings;

#[tokio::test]
async fn memory_server_boots_issues_and_shuts_down() {
    let settings = parse_settings(Some("tests/fixtures/test.toml")).unwrap();
    let server = Server::try_new(&settings).await.unwrap();

    let response = server
        .auth_coordinator
        .register(RegisterInput {
            email: "boot@x.com".to_string(),
            username: "boot".to_string(),
            password: "secret1".to_string(),
            device_info: None,
        })
        .await
        .unwrap();
    assert!(
        server
            .auth_coordinator
            .validate_access(&response.tokens.access_token)
            .await
            .is_valid()
    );

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_backends_fail_startup() {
    let mut settings = parse_settings(Some("tests/fixtures/test.toml")).unwrap();
    settings.store.backend = "cassandra".to_string();
    assert!(Server::try_new(&settings).await.is_err());

    let mut settings = parse_settings(Some("tests/fixtures/test.toml")).unwrap();
    settings.identity.backend = "ldap".to_string();
    assert!(Server::try_new(&settings).await.is_err());
}

#[tokio::test]
async fn empty_signing_secret_fails_startup() {
    let mut settings = parse_settings(Some("tests/fixtures/test.toml")).unwrap();
    settings.jwt.refresh_secret.clear();
    assert!(Server::try_new(&settings).await.is_err());
}
