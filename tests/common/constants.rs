//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (user credentials, post slugs, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// Display name of the regular test user
pub const TEST_USER_DISPLAY_NAME: &str = "Test User";

/// Second test user handle (for multi-user scenarios)
pub const SECOND_USER: &str = "otheruser";

/// Second test user password
pub const SECOND_PASS: &str = "otherpass123";

// ============================================================================
// Test Post Slugs
// ============================================================================
//
// Posts live in the CMS; engagement rows reference them by slug only, so any
// opaque string works here.

pub const POST_1_SLUG: &str = "first-post";

pub const POST_2_SLUG: &str = "second-post";

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for individual HTTP requests in tests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long to wait for the test server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Poll interval while waiting for the test server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
