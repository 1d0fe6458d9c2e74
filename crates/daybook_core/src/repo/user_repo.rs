//! User rows and their JSON configuration.

use crate::config::UserConfig;
use crate::repo::{parse_json, to_json, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub config: UserConfig,
}

pub trait UserRepository {
    fn create_user(&self, name: &str, config: &UserConfig) -> RepoResult<UserRecord>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<UserRecord>>;
    fn update_config(&self, id: UserId, config: &UserConfig) -> RepoResult<()>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads a user or fails with `UserNotFound`.
    pub fn require(&self, id: UserId) -> RepoResult<UserRecord> {
        self.get_user(id)?.ok_or(RepoError::UserNotFound(id))
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, name: &str, config: &UserConfig) -> RepoResult<UserRecord> {
        self.conn.execute(
            "INSERT INTO users (name, config) VALUES (?1, ?2);",
            params![name, to_json(config, "users.config")?],
        )?;
        let id = self.conn.last_insert_rowid();
        self.require(id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<UserRecord>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT name, config FROM users WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((name, config)) => Ok(Some(UserRecord {
                id,
                name,
                config: parse_json(&config, "users.config")?,
            })),
        }
    }

    fn update_config(&self, id: UserId, config: &UserConfig) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET config = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, to_json(config, "users.config")?],
        )?;
        if changed == 0 {
            return Err(RepoError::UserNotFound(id));
        }
        Ok(())
    }
}
