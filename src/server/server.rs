use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::session::Session;
use super::state::*;
use super::{log_requests, RequestsLoggingLevel, ServerConfig};
use crate::engagement::{EngagementError, EngagementManager, FullStore};
use crate::user::{AuthTokenValue, UserManager};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Deserialize, Debug)]
struct CreateCommentBody {
    pub post_slug: String,
    pub content: String,
    /// Display name shown for this response when the caller is anonymous.
    pub author_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UpdateCommentBody {
    pub content: String,
}

fn engagement_error_response(err: EngagementError) -> Response {
    match err {
        EngagementError::Validation(message) => {
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        EngagementError::Unauthenticated => StatusCode::UNAUTHORIZED.into_response(),
        EngagementError::NotFound => StatusCode::NOT_FOUND.into_response(),
        EngagementError::Persistence(err) => {
            error!("Engagement operation failed: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

async fn login(
    State(user_manager): State<SharedUserManager>,
    Json(body): Json<LoginBody>,
) -> Response {
    debug!("login() called for {}", body.user_handle);
    let credentials = match user_manager.get_user_credentials(&body.user_handle) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => return StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            error!("Error reading credentials: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(password_credentials) = &credentials.username_password else {
        return StatusCode::FORBIDDEN.into_response();
    };
    if !matches!(
        password_credentials
            .hasher
            .verify(&body.password, &password_credentials.hash),
        Ok(true)
    ) {
        return StatusCode::FORBIDDEN.into_response();
    }

    match user_manager.generate_auth_token(&credentials) {
        Ok(auth_token) => {
            let response_body = serde_json::to_string(&LoginSuccessResponse {
                token: auth_token.value.0.clone(),
            })
            .unwrap();

            let cookie_value = HeaderValue::from_str(&format!(
                "session_token={}; Path=/; HttpOnly",
                auth_token.value.0
            ))
            .unwrap();
            response::Builder::new()
                .status(StatusCode::CREATED)
                .header(axum::http::header::SET_COOKIE, cookie_value)
                .body(Body::from(response_body))
                .unwrap()
        }
        Err(err) => {
            error!("Error with auth token generation: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(user_manager): State<SharedUserManager>, session: Session) -> Response {
    match user_manager.delete_auth_token(&AuthTokenValue(session.token)) {
        Ok(_) => {
            let cookie_value = Cookie::build(Cookie::new("session_token", ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
                .same_site(SameSite::Lax)
                .build();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
                .body(Body::empty())
                .unwrap()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn get_comments(
    _session: Option<Session>,
    State(engagement): State<SharedEngagementManager>,
    Path(post_slug): Path<String>,
) -> Response {
    match engagement.list_comments(&post_slug) {
        Ok(comments) => Json(comments).into_response(),
        Err(err) => engagement_error_response(err),
    }
}

async fn post_comment(
    session: Option<Session>,
    State(engagement): State<SharedEngagementManager>,
    Json(body): Json<CreateCommentBody>,
) -> Response {
    match engagement.create_comment(
        &body.post_slug,
        &body.content,
        body.author_name.as_deref(),
        session.map(|s| s.user_id),
    ) {
        Ok(comment) => Json(comment).into_response(),
        Err(err) => engagement_error_response(err),
    }
}

async fn put_comment(
    session: Session,
    State(engagement): State<SharedEngagementManager>,
    Path(comment_id): Path<String>,
    Json(body): Json<UpdateCommentBody>,
) -> Response {
    let Ok(comment_id) = comment_id.parse::<usize>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match engagement.edit_comment(comment_id, session.user_id, &body.content) {
        Ok(comment) => Json(comment).into_response(),
        Err(err) => engagement_error_response(err),
    }
}

async fn delete_comment(
    session: Session,
    State(engagement): State<SharedEngagementManager>,
    Path(comment_id): Path<String>,
) -> Response {
    let Ok(comment_id) = comment_id.parse::<usize>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match engagement.delete_comment(comment_id, session.user_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => engagement_error_response(err),
    }
}

async fn get_post_stats(
    session: Option<Session>,
    State(engagement): State<SharedEngagementManager>,
    Path(post_slug): Path<String>,
) -> Response {
    match engagement.post_stats(&post_slug, session.map(|s| s.user_id)) {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => engagement_error_response(err),
    }
}

async fn toggle_post_like(
    session: Option<Session>,
    State(engagement): State<SharedEngagementManager>,
    Path(post_slug): Path<String>,
) -> Response {
    match engagement.toggle_like(&post_slug, session.map(|s| s.user_id)) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => engagement_error_response(err),
    }
}

async fn record_post_view(
    session: Option<Session>,
    State(engagement): State<SharedEngagementManager>,
    Path(post_slug): Path<String>,
) -> Response {
    match engagement.record_view(&post_slug, session.map(|s| s.user_id)) {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => engagement_error_response(err),
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        user_manager: UserManager,
        engagement: EngagementManager,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            user_manager: Arc::new(user_manager),
            engagement: Arc::new(engagement),
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(config: ServerConfig, store: Arc<dyn FullStore>) -> Result<Router> {
    let user_manager = UserManager::new(store.clone());
    let engagement = EngagementManager::new(
        store,
        Duration::from_secs(config.view_window_minutes * 60),
    );
    let state = ServerState::new(config.clone(), user_manager, engagement);

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let comment_routes: Router = Router::new()
        .route("/", post(post_comment))
        .route(
            "/{key}",
            get(get_comments).put(put_comment).delete(delete_comment),
        )
        .with_state(state.clone());

    let post_routes: Router = Router::new()
        .route("/{slug}/stats", get(get_post_stats))
        .route(
            "/{slug}/like",
            post(toggle_post_like).delete(toggle_post_like),
        )
        .route("/{slug}/view", post(record_post_view))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/comments", comment_routes)
        .nest("/v1/posts", post_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    store: Arc<dyn FullStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    view_window_minutes: u64,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        view_window_minutes,
        frontend_dir_path,
    };
    let app = make_app(config, store)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
