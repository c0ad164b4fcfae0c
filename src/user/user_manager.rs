use super::auth::CredentialHasher;
use super::{
    AuthToken, AuthTokenValue, NewUser, User, UserAuthCredentials, UsernamePasswordCredentials,
};
use crate::engagement::FullStore;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::SystemTime;

/// Account plumbing: user provisioning, password credentials and session
/// tokens. Signup and profile editing live in external account-management;
/// this side only needs enough to resolve and authenticate identities.
pub struct UserManager {
    store: Arc<dyn FullStore>,
}

impl UserManager {
    pub fn new(store: Arc<dyn FullStore>) -> Self {
        Self { store }
    }

    pub fn add_user(&self, new_user: NewUser) -> Result<usize> {
        if new_user.handle.trim().is_empty() {
            bail!("The user handle cannot be empty.");
        }
        if new_user.email.trim().is_empty() {
            bail!("The user email cannot be empty.");
        }
        if self.store.get_user_by_handle(&new_user.handle)?.is_some() {
            bail!("User handle already exists.");
        }
        self.store.create_user(new_user)
    }

    pub fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        self.store.get_user(user_id)
    }

    pub fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        self.store.get_user_by_handle(handle)
    }

    pub fn get_all_user_handles(&self) -> Result<Vec<String>> {
        self.store.get_all_user_handles()
    }

    pub fn set_user_password<T: AsRef<str>>(&self, user_handle: &str, password: T) -> Result<()> {
        let Some(user) = self.store.get_user_by_handle(user_handle)? else {
            bail!("No such user: {}", user_handle);
        };

        let hasher = CredentialHasher::Argon2;
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_ref().as_bytes(), &salt)?;

        self.store.update_user_auth_credentials(UserAuthCredentials {
            user_id: user.id,
            username_password: Some(UsernamePasswordCredentials {
                user_id: user.id,
                salt,
                hash,
                hasher,
                created: SystemTime::now(),
                last_tried: None,
                last_used: None,
            }),
        })
    }

    pub fn get_user_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        self.store.get_user_auth_credentials(user_handle)
    }

    pub fn generate_auth_token(&self, credentials: &UserAuthCredentials) -> Result<AuthToken> {
        let token = AuthToken {
            user_id: credentials.user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.store.add_user_auth_token(token.clone())?;
        Ok(token)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.store.get_user_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.store.update_user_auth_token_last_used(value)
    }

    pub fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.store.delete_user_auth_token(value)
    }
}
