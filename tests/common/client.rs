//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all engagement-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for anonymous-caller scenarios and authentication flows.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client pre-authenticated as the regular test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client pre-authenticated as the given user
    pub async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication as {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "user_handle": handle,
                "password": password
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Comment Endpoints
    // ========================================================================

    /// GET /v1/comments/{slug}
    pub async fn get_comments(&self, slug: &str) -> Response {
        self.client
            .get(format!("{}/v1/comments/{}", self.base_url, slug))
            .send()
            .await
            .expect("Get comments request failed")
    }

    /// POST /v1/comments
    pub async fn create_comment(
        &self,
        slug: &str,
        content: &str,
        author_name: Option<&str>,
    ) -> Response {
        let mut body = json!({
            "post_slug": slug,
            "content": content
        });
        if let Some(name) = author_name {
            body["author_name"] = json!(name);
        }
        self.client
            .post(format!("{}/v1/comments", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create comment request failed")
    }

    /// PUT /v1/comments/{id}
    pub async fn update_comment(&self, comment_id: u64, content: &str) -> Response {
        self.client
            .put(format!("{}/v1/comments/{}", self.base_url, comment_id))
            .json(&json!({ "content": content }))
            .send()
            .await
            .expect("Update comment request failed")
    }

    /// DELETE /v1/comments/{id}
    pub async fn delete_comment(&self, comment_id: u64) -> Response {
        self.client
            .delete(format!("{}/v1/comments/{}", self.base_url, comment_id))
            .send()
            .await
            .expect("Delete comment request failed")
    }

    // ========================================================================
    // Post Stats / Like / View Endpoints
    // ========================================================================

    /// GET /v1/posts/{slug}/stats
    pub async fn get_stats(&self, slug: &str) -> Response {
        self.client
            .get(format!("{}/v1/posts/{}/stats", self.base_url, slug))
            .send()
            .await
            .expect("Get stats request failed")
    }

    /// POST /v1/posts/{slug}/like
    pub async fn toggle_like(&self, slug: &str) -> Response {
        self.client
            .post(format!("{}/v1/posts/{}/like", self.base_url, slug))
            .send()
            .await
            .expect("Toggle like request failed")
    }

    /// DELETE /v1/posts/{slug}/like
    pub async fn remove_like(&self, slug: &str) -> Response {
        self.client
            .delete(format!("{}/v1/posts/{}/like", self.base_url, slug))
            .send()
            .await
            .expect("Remove like request failed")
    }

    /// POST /v1/posts/{slug}/view
    pub async fn record_view(&self, slug: &str) -> Response {
        self.client
            .post(format!("{}/v1/posts/{}/view", self.base_url, slug))
            .send()
            .await
            .expect("Record view request failed")
    }

    // ========================================================================
    // Health Check / System Endpoints
    // ========================================================================

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Get home request failed")
    }
}
