use axum::extract::FromRef;

use crate::engagement::EngagementManager;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type SharedUserManager = Arc<UserManager>;
pub type SharedEngagementManager = Arc<EngagementManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_manager: SharedUserManager,
    pub engagement: SharedEngagementManager,
    pub hash: String,
}

impl FromRef<ServerState> for SharedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for SharedEngagementManager {
    fn from_ref(input: &ServerState) -> Self {
        input.engagement.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
