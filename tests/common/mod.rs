//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, POST_1_SLUG};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_comments() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::authenticated(server.base_url.clone()).await;
//!
//!     let response = client.get_comments(POST_1_SLUG).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

// Not every test crate uses every helper
#[allow(dead_code)]
mod client;
#[allow(dead_code)]
mod constants;
#[allow(dead_code)]
mod fixtures;
#[allow(dead_code)]
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use server::TestServer;
