//! User data models

use std::time::SystemTime;

use serde::Serialize;

#[derive(Clone, Serialize, Debug)]
pub struct User {
    pub id: usize,
    pub handle: String,
    pub email: String,
    pub display_name: Option<String>,
    pub profile_image: Option<String>,
    pub created: SystemTime,
}

impl User {
    /// The name shown next to this user's comments.
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.handle)
    }
}

/// Fields needed to insert a user row; id and created are store-assigned.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub handle: String,
    pub email: String,
    pub display_name: Option<String>,
    pub profile_image: Option<String>,
}
