//! User and configuration use-cases.

use crate::config::UserConfig;
use crate::repo::user_repo::{UserId, UserRecord, UserRepository};
use crate::repo::Store;
use crate::service::{normalize_title, with_transaction, ServiceResult};
use log::info;
use rusqlite::Connection;

/// User service facade.
pub struct UserService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> UserService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn create_user(&self, name: &str, config: &UserConfig) -> ServiceResult<UserRecord> {
        let name = normalize_title(name)?;
        let user = with_transaction(self.conn, |store| Ok(store.users.create_user(&name, config)?))?;
        info!(
            "event=user_create module=service status=ok user_id={} permanent_sections={}",
            user.id,
            user.config.permanent_sections.len()
        );
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> ServiceResult<Option<UserRecord>> {
        Ok(Store::new(self.conn).users.get_user(user_id)?)
    }

    /// Replaces the stored configuration. Existing days are not reconciled;
    /// new sections appear on days created afterwards or on explicit
    /// reconcile.
    pub fn update_config(&self, user_id: UserId, config: &UserConfig) -> ServiceResult<UserRecord> {
        with_transaction(self.conn, |store| {
            store.users.update_config(user_id, config)?;
            Ok(store.users.require(user_id)?)
        })
    }
}
