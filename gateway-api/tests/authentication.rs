use gateway_telemetry::tracing::init_test_tracing;
use reqwest::StatusCode;

use crate::support::test_app::{APPLICATIONS, CLUSTERS, spawn_test_app};

mod support;

#[tokio::test(flavor = "multi_thread")]
async fn requests_without_token_are_rejected() {
    init_test_tracing();
    // Arrange
    let app = spawn_test_app().await;

    for backend in [CLUSTERS, APPLICATIONS] {
        // Act
        let response = app
            .api_client
            .get(format!("{}/api/v1/{backend}", app.address))
            .send()
            .await
            .expect("Failed to execute request.");

        // Assert
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(app.client.calls().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn requests_with_unknown_token_are_rejected() {
    init_test_tracing();
    // Arrange
    let app = spawn_test_app().await;
    let unknown_key = "ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZY=";

    // Act
    let response = app
        .api_client
        .post(format!("{}/api/v1/{CLUSTERS}", app.address))
        .bearer_auth(unknown_key)
        .json(&serde_json::json!({ "id": "abc" }))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.client.calls().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn requests_with_malformed_token_are_rejected() {
    init_test_tracing();
    // Arrange
    let app = spawn_test_app().await;

    // Act
    let response = app
        .api_client
        .delete(format!("{}/api/v1/{APPLICATIONS}/tenant-1", app.address))
        .bearer_auth("not-a-key")
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn trailing_slash_is_accepted() {
    init_test_tracing();
    // Arrange
    let app = spawn_test_app().await;

    // Act
    let response = app
        .api_client
        .get(format!("{}/api/v1/{CLUSTERS}/", app.address))
        .bearer_auth(&app.api_key)
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
}
