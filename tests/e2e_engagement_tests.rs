//! End-to-end tests for post stats, like toggling and view recording

mod common;

use blog_engagement_server::EngagementStore;
use common::{TestClient, TestServer, POST_1_SLUG, POST_2_SLUG, SECOND_PASS, SECOND_USER};
use reqwest::StatusCode;

async fn stats(client: &TestClient, slug: &str) -> serde_json::Value {
    let response = client.get_stats(slug).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

// =============================================================================
// Stats
// =============================================================================

#[tokio::test]
async fn test_stats_start_at_zero() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let body = stats(&client, POST_1_SLUG).await;
    assert_eq!(body["slug"], POST_1_SLUG);
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["view_count"], 0);
    assert_eq!(body["liked_by_caller"], false);
}

// =============================================================================
// Likes
// =============================================================================

#[tokio::test]
async fn test_anonymous_like_is_unauthorized_and_writes_nothing() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.toggle_like(POST_1_SLUG).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(server.store.count_likes(POST_1_SLUG).unwrap(), 0);
}

#[tokio::test]
async fn test_toggle_like_flips_state_and_count() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.toggle_like(POST_1_SLUG).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = stats(&client, POST_1_SLUG).await;
    assert_eq!(body["like_count"], 1);
    assert_eq!(body["liked_by_caller"], true);

    // Toggling again returns to the original state
    let response = client.toggle_like(POST_1_SLUG).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = stats(&client, POST_1_SLUG).await;
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["liked_by_caller"], false);
}

#[tokio::test]
async fn test_delete_like_is_a_symmetric_toggle() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    client.toggle_like(POST_1_SLUG).await;
    let response = client.remove_like(POST_1_SLUG).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = stats(&client, POST_1_SLUG).await;
    assert_eq!(body["like_count"], 0);
}

#[tokio::test]
async fn test_likes_are_per_user_and_per_post() {
    let server = TestServer::spawn().await;
    let first = TestClient::authenticated(server.base_url.clone()).await;
    let second =
        TestClient::authenticated_as(server.base_url.clone(), SECOND_USER, SECOND_PASS).await;
    let anonymous = TestClient::new(server.base_url.clone());

    first.toggle_like(POST_1_SLUG).await;
    second.toggle_like(POST_1_SLUG).await;

    let body = stats(&first, POST_1_SLUG).await;
    assert_eq!(body["like_count"], 2);
    assert_eq!(body["liked_by_caller"], true);

    // An anonymous caller sees the count but no like state
    let body = stats(&anonymous, POST_1_SLUG).await;
    assert_eq!(body["like_count"], 2);
    assert_eq!(body["liked_by_caller"], false);

    // The other post is untouched
    let body = stats(&first, POST_2_SLUG).await;
    assert_eq!(body["like_count"], 0);
}

// =============================================================================
// Views
// =============================================================================

#[tokio::test]
async fn test_anonymous_view_succeeds_without_tracking() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.record_view(POST_1_SLUG).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["view_count"], 0);
    assert_eq!(body["counted"], false);

    assert_eq!(server.store.count_views(POST_1_SLUG).unwrap(), 0);
}

#[tokio::test]
async fn test_repeat_view_within_the_window_is_not_counted() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let first: serde_json::Value = client
        .record_view(POST_1_SLUG)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["view_count"], 1);
    assert_eq!(first["counted"], true);

    let second: serde_json::Value = client
        .record_view(POST_1_SLUG)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["view_count"], 1);
    assert_eq!(second["counted"], false);
}

#[tokio::test]
async fn test_view_past_the_window_renews_without_growing_the_count() {
    // A zero-minute window makes every repeat view a renewal
    let server = TestServer::spawn_with_view_window(0).await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let first: serde_json::Value = client
        .record_view(POST_1_SLUG)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["counted"], true);

    let renewed: serde_json::Value = client
        .record_view(POST_1_SLUG)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(renewed["counted"], true);
    // Still one distinct viewer
    assert_eq!(renewed["view_count"], 1);
}

#[tokio::test]
async fn test_view_count_is_a_distinct_viewer_count() {
    let server = TestServer::spawn().await;
    let first = TestClient::authenticated(server.base_url.clone()).await;
    let second =
        TestClient::authenticated_as(server.base_url.clone(), SECOND_USER, SECOND_PASS).await;

    first.record_view(POST_1_SLUG).await;
    let body: serde_json::Value = second
        .record_view(POST_1_SLUG)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["view_count"], 2);
    assert_eq!(body["counted"], true);

    let body = stats(&first, POST_1_SLUG).await;
    assert_eq!(body["view_count"], 2);
}
