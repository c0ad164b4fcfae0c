//! Test fixture creation for the engagement database

use super::constants::*;
use anyhow::Result;
use blog_engagement_server::user::{NewUser, SqliteUserStore, UserManager};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a temporary database with the two test users.
/// Returns (temp_dir, db_path).
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");

    {
        let store = Arc::new(SqliteUserStore::new(&db_path)?);
        let manager = UserManager::new(store);

        create_user_with_password(
            &manager,
            TEST_USER,
            TEST_PASS,
            Some(TEST_USER_DISPLAY_NAME),
        )?;
        create_user_with_password(&manager, SECOND_USER, SECOND_PASS, None)?;
    }

    Ok((temp_dir, db_path))
}

/// Creates a user with the given credentials
pub fn create_user_with_password(
    manager: &UserManager,
    handle: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<usize> {
    let user_id = manager.add_user(NewUser {
        handle: handle.to_string(),
        email: format!("{}@example.com", handle),
        display_name: display_name.map(str::to_string),
        profile_image: None,
    })?;
    manager.set_user_password(handle, password)?;
    Ok(user_id)
}
