use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use uuid::Uuid;

use crate::models::User;

/// DirectoryError
///
/// Failure to reach the backing store. A missing user is not an error (`Ok(None)`).
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// UserDirectory Trait
///
/// The lookup contract the session resolver uses to confirm that a token's subject is
/// still an active user. **Send + Sync + async_trait** make `Arc<dyn UserDirectory>`
/// shareable across Axum's task boundaries.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;
}

pub type DirectoryState = Arc<dyn UserDirectory>;

/// PostgresDirectory
///
/// Directory backed by the `public.profiles` table.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT p.id, u.email, p.role
            FROM public.profiles p
            JOIN auth.users u ON u.id = p.id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// InMemoryDirectory
///
/// Directory used for local runs without a database and for tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.insert(user);
        }
        directory
    }

    pub fn insert(&self, user: User) {
        self.users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user.id, user);
    }

    pub fn remove(&self, id: Uuid) -> Option<User> {
        self.users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let users = self
            .users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(users.get(&id).cloned())
    }
}
