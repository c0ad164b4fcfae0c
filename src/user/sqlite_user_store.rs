use crate::engagement::models::{Comment, CommentRecord, Like, PostView};
use crate::engagement::{EngagementStore, PairInsert};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnDelete, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};
use crate::user::auth::CredentialHasher;
use crate::user::*;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::info;

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Cascade,
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("display_name", &SqlType::Text),
        sqlite_column!("profile_image", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};
const USER_PASSWORD_CREDENTIALS_TABLE_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_tried", &SqlType::Integer),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};
const COMMENT_TABLE_V_0: Table = Table {
    name: "comment",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("post_slug", &SqlType::Text, non_null = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("updated", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_comment_post_slug", "post_slug")],
};
const POST_LIKE_TABLE_V_0: Table = Table {
    name: "post_like",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("post_slug", &SqlType::Text, non_null = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    // At most one like per (post, user); this constraint, not application
    // logic, is what serializes concurrent toggles.
    unique_constraints: &[&["post_slug", "user_id"]],
    indices: &[("idx_post_like_post_slug", "post_slug")],
};

/// V 1
const POST_VIEW_TABLE_V_1: Table = Table {
    name: "post_view",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("post_slug", &SqlType::Text, non_null = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!("last_seen", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[&["post_slug", "user_id"]],
    indices: &[("idx_post_view_post_slug", "post_slug")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            COMMENT_TABLE_V_0,
            POST_LIKE_TABLE_V_0,
        ],
        migration: None,
    },
    // View tracking was added after comments and likes shipped.
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            COMMENT_TABLE_V_0,
            POST_LIKE_TABLE_V_0,
            POST_VIEW_TABLE_V_1,
        ],
        migration: Some(|conn: &Connection| {
            POST_VIEW_TABLE_V_1.create(conn)?;
            Ok(())
        }),
    },
];

fn unix_from_system_time(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn system_time_from_column(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value as u64)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(db_path)?;
            VERSIONED_SCHEMAS
                .last()
                .context("No schema versions defined")?
                .create(&conn)?;
            conn
        };
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Database version {} predates base version {}, refusing to open",
                db_version,
                BASE_DB_VERSION
            );
        }
        if db_version >= VERSIONED_SCHEMAS.len() as i64 {
            bail!("Database version {} is too new", db_version);
        }
        let version = db_version as usize;
        VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let mut latest = version;
        for schema in VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!("Migrating db from version {} to {}", latest, schema.version);
                migration_fn(conn)?;
                latest = schema.version;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest),
            [],
        )?;
        Ok(())
    }

    fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            handle: row.get(1)?,
            email: row.get(2)?,
            display_name: row.get(3)?,
            profile_image: row.get(4)?,
            created: system_time_from_column(row.get(5)?),
        })
    }
}

const USER_COLUMNS: &str = "id, handle, email, display_name, profile_image, created";

impl UserStore for SqliteUserStore {
    fn create_user(&self, new_user: NewUser) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (handle, email, display_name, profile_image) VALUES (?1, ?2, ?3, ?4)",
                USER_TABLE_V_0.name
            ),
            params![
                new_user.handle,
                new_user.email,
                new_user.display_name,
                new_user.profile_image
            ],
        )
        .with_context(|| format!("Failed to create user {}", new_user.handle))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE id = ?1",
            USER_COLUMNS,
            USER_TABLE_V_0.name
        ))?;
        let user = stmt
            .query_row(params![user_id], Self::user_from_row)
            .map(Some)
            .or_else(none_if_no_rows)?;
        Ok(user)
    }

    fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE handle = ?1",
            USER_COLUMNS,
            USER_TABLE_V_0.name
        ))?;
        let user = stmt
            .query_row(params![handle], Self::user_from_row)
            .map(Some)
            .or_else(none_if_no_rows)?;
        Ok(user)
    }

    fn get_all_user_handles(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT handle FROM {}", USER_TABLE_V_0.name))?;
        let handles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(handles)
    }
}

fn none_if_no_rows<T>(err: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
        )?;
        let token = stmt
            .query_row(params![value.0], |row| {
                Ok(AuthToken {
                    user_id: row.get(0)?,
                    value: AuthTokenValue(row.get(1)?),
                    created: system_time_from_column(row.get(2)?),
                    last_used: row
                        .get::<usize, Option<i64>>(3)?
                        .map(system_time_from_column),
                })
            })
            .map(Some)
            .or_else(none_if_no_rows)?;
        Ok(token)
    }

    fn delete_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let Some(token) = self.get_user_auth_token(value)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM auth_token WHERE value = ?1",
            params![token.value.0],
        )?;
        Ok(Some(token))
    }

    fn update_user_auth_token_last_used(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token SET last_used = ?1 WHERE value = ?2",
            params![unix_from_system_time(SystemTime::now()), token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (user_id, value) VALUES (?1, ?2)",
            params![token.user_id, token.value.0],
        )?;
        Ok(())
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_user_auth_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        let Some(user) = self.get_user_by_handle(user_handle)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, salt, hash, hasher, created, last_tried, last_used
             FROM user_password_credentials WHERE user_id = ?1",
        )?;
        let password_credentials = stmt
            .query_row(params![user.id], |row| {
                let hasher_name: String = row.get(3)?;
                let hasher = CredentialHasher::from_str(&hasher_name)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?;
                Ok(UsernamePasswordCredentials {
                    user_id: row.get(0)?,
                    salt: row.get(1)?,
                    hash: row.get(2)?,
                    hasher,
                    created: system_time_from_column(row.get(4)?),
                    last_tried: row
                        .get::<usize, Option<i64>>(5)?
                        .map(system_time_from_column),
                    last_used: row
                        .get::<usize, Option<i64>>(6)?
                        .map(system_time_from_column),
                })
            })
            .map(Some)
            .or_else(none_if_no_rows)?;

        Ok(Some(UserAuthCredentials {
            user_id: user.id,
            username_password: password_credentials,
        }))
    }

    fn update_user_auth_credentials(&self, credentials: UserAuthCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let user_id = credentials.user_id;
        match credentials.username_password.as_ref() {
            Some(password_credentials) => {
                let updated = conn.execute(
                    "UPDATE user_password_credentials SET salt = ?1, hash = ?2, hasher = ?3 WHERE user_id = ?4",
                    params![
                        password_credentials.salt,
                        password_credentials.hash,
                        password_credentials.hasher.to_string(),
                        user_id
                    ],
                )?;
                if updated == 0 {
                    conn.execute(
                        "INSERT INTO user_password_credentials (user_id, salt, hash, hasher) VALUES (?1, ?2, ?3, ?4)",
                        params![
                            user_id,
                            password_credentials.salt,
                            password_credentials.hash,
                            password_credentials.hasher.to_string()
                        ],
                    )?;
                }
            }
            None => {
                conn.execute(
                    "DELETE FROM user_password_credentials WHERE user_id = ?1",
                    params![user_id],
                )?;
            }
        };
        Ok(())
    }
}

impl EngagementStore for SqliteUserStore {
    fn find_like(&self, post_slug: &str, user_id: usize) -> Result<Option<Like>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, post_slug, user_id, created FROM {} WHERE post_slug = ?1 AND user_id = ?2",
            POST_LIKE_TABLE_V_0.name
        ))?;
        let like = stmt
            .query_row(params![post_slug, user_id], |row| {
                Ok(Like {
                    id: row.get(0)?,
                    post_slug: row.get(1)?,
                    user_id: row.get(2)?,
                    created: system_time_from_column(row.get(3)?),
                })
            })
            .map(Some)
            .or_else(none_if_no_rows)?;
        Ok(like)
    }

    fn insert_like(
        &self,
        post_slug: &str,
        user_id: usize,
        created: SystemTime,
    ) -> Result<PairInsert> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            &format!(
                "INSERT INTO {} (post_slug, user_id, created) VALUES (?1, ?2, ?3)",
                POST_LIKE_TABLE_V_0.name
            ),
            params![post_slug, user_id, unix_from_system_time(created)],
        );
        match result {
            Ok(_) => Ok(PairInsert::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(PairInsert::AlreadyPresent),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to insert like for {}", post_slug))
            }
        }
    }

    fn delete_like(&self, like_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", POST_LIKE_TABLE_V_0.name),
            params![like_id],
        )?;
        Ok(deleted > 0)
    }

    fn count_likes(&self, post_slug: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE post_slug = ?1",
                POST_LIKE_TABLE_V_0.name
            ),
            params![post_slug],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn find_view(&self, post_slug: &str, user_id: usize) -> Result<Option<PostView>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, post_slug, user_id, created, last_seen FROM {} WHERE post_slug = ?1 AND user_id = ?2",
            POST_VIEW_TABLE_V_1.name
        ))?;
        let view = stmt
            .query_row(params![post_slug, user_id], |row| {
                Ok(PostView {
                    id: row.get(0)?,
                    post_slug: row.get(1)?,
                    user_id: row.get(2)?,
                    created: system_time_from_column(row.get(3)?),
                    last_seen: system_time_from_column(row.get(4)?),
                })
            })
            .map(Some)
            .or_else(none_if_no_rows)?;
        Ok(view)
    }

    fn insert_view(&self, post_slug: &str, user_id: usize, now: SystemTime) -> Result<PairInsert> {
        let conn = self.conn.lock().unwrap();
        let now_secs = unix_from_system_time(now);
        let result = conn.execute(
            &format!(
                "INSERT INTO {} (post_slug, user_id, created, last_seen) VALUES (?1, ?2, ?3, ?3)",
                POST_VIEW_TABLE_V_1.name
            ),
            params![post_slug, user_id, now_secs],
        );
        match result {
            Ok(_) => Ok(PairInsert::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(PairInsert::AlreadyPresent),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to insert view for {}", post_slug))
            }
        }
    }

    fn touch_view(&self, view_id: usize, last_seen: SystemTime) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE {} SET last_seen = ?1 WHERE id = ?2",
                POST_VIEW_TABLE_V_1.name
            ),
            params![unix_from_system_time(last_seen), view_id],
        )?;
        Ok(())
    }

    fn count_views(&self, post_slug: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE post_slug = ?1",
                POST_VIEW_TABLE_V_1.name
            ),
            params![post_slug],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn insert_comment(
        &self,
        post_slug: &str,
        user_id: usize,
        content: &str,
        created: SystemTime,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (post_slug, user_id, content, created) VALUES (?1, ?2, ?3, ?4)",
                COMMENT_TABLE_V_0.name
            ),
            params![post_slug, user_id, content, unix_from_system_time(created)],
        )
        .with_context(|| format!("Failed to insert comment on {}", post_slug))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_comment(&self, comment_id: usize) -> Result<Option<Comment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, post_slug, user_id, content, created, updated FROM {} WHERE id = ?1",
            COMMENT_TABLE_V_0.name
        ))?;
        let comment = stmt
            .query_row(params![comment_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_slug: row.get(1)?,
                    user_id: row.get(2)?,
                    content: row.get(3)?,
                    created: system_time_from_column(row.get(4)?),
                    updated: row
                        .get::<usize, Option<i64>>(5)?
                        .map(system_time_from_column),
                })
            })
            .map(Some)
            .or_else(none_if_no_rows)?;
        Ok(comment)
    }

    fn update_comment_content(
        &self,
        comment_id: usize,
        content: &str,
        updated: SystemTime,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE {} SET content = ?1, updated = ?2 WHERE id = ?3",
                COMMENT_TABLE_V_0.name
            ),
            params![content, unix_from_system_time(updated), comment_id],
        )?;
        Ok(())
    }

    fn delete_comment(&self, comment_id: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", COMMENT_TABLE_V_0.name),
            params![comment_id],
        )?;
        Ok(())
    }

    fn comments_for_post(&self, post_slug: &str) -> Result<Vec<CommentRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT c.id, c.post_slug, c.user_id, c.content, c.created, c.updated,
                    u.id, u.handle, u.email, u.display_name, u.profile_image, u.created
             FROM {} c JOIN {} u ON c.user_id = u.id
             WHERE c.post_slug = ?1
             ORDER BY c.created DESC, c.id DESC",
            COMMENT_TABLE_V_0.name,
            USER_TABLE_V_0.name
        ))?;
        let records = stmt
            .query_map(params![post_slug], |row| {
                Ok(CommentRecord {
                    comment: Comment {
                        id: row.get(0)?,
                        post_slug: row.get(1)?,
                        user_id: row.get(2)?,
                        content: row.get(3)?,
                        created: system_time_from_column(row.get(4)?),
                        updated: row
                            .get::<usize, Option<i64>>(5)?
                            .map(system_time_from_column),
                    },
                    author: User {
                        id: row.get(6)?,
                        handle: row.get(7)?,
                        email: row.get(8)?,
                        display_name: row.get(9)?,
                        profile_image: row.get(10)?,
                        created: system_time_from_column(row.get(11)?),
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
