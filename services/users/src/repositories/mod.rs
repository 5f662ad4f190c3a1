//! Repositories for database operations

use anyhow::Result;
use async_trait::async_trait;

use crate::models::User;

pub mod user;

pub use user::PgUserRepository;

/// Persistence contract for users.
///
/// `save` assigns id and version on insert, bumps the version with an
/// optimistic-lock check on update, and replaces the role associations
/// wholesale. A unique-email violation or a lost optimistic-lock race
/// surfaces as an error from the storage layer.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a user, returning the stored entity with id and version set
    async fn save(&self, user: &User) -> Result<User>;

    /// All users in repository iteration order
    async fn find_all(&self) -> Result<Vec<User>>;

    /// Look up a user by id
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Remove a user
    async fn delete(&self, user: &User) -> Result<()>;

    /// Look up a user by unique email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}
