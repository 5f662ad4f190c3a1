//! User service facade
//!
//! Mediates between the HTTP handlers and the user repository: CRUD
//! operations plus the lookup-by-username contract the authentication layer
//! consumes. Apart from [`UserService::load_user_by_username`], absence is
//! absorbed into a `None` sentinel plus a log event; callers branch on the
//! sentinel themselves.

use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, warn};

use crate::models::User;
use crate::repositories::UserRepository;
use crate::security::PasswordEncoder;

/// Errors surfaced by the user service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Raised only from the authentication lookup path
    #[error("user with username='{0}' not found")]
    UsernameNotFound(String),

    /// Persistence failures pass through unchanged
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Type alias for service results
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service facade over the user repository and the password encoder
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl UserService {
    /// Create a new user service
    pub fn new(repository: Arc<dyn UserRepository>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self {
            repository,
            encoder,
        }
    }

    /// Persist a new user.
    ///
    /// The incoming password is hashed before storage; every path that
    /// writes a password goes through the encoder.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, mut user: User) -> ServiceResult<User> {
        user.password = self.encoder.encode(&user.password)?;
        Ok(self.repository.save(&user).await?)
    }

    /// Up to `count` users in repository iteration order
    #[instrument(skip(self))]
    pub async fn list(&self, count: usize) -> ServiceResult<Vec<User>> {
        let mut users = self.repository.find_all().await?;
        users.truncate(count);
        Ok(users)
    }

    /// Every user, in repository iteration order
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> ServiceResult<Vec<User>> {
        Ok(self.repository.find_all().await?)
    }

    /// Look up a user by id; absence is a sentinel, not an error
    #[instrument(skip(self))]
    pub async fn find(&self, id: i64) -> ServiceResult<Option<User>> {
        let user = self.repository.find_by_id(id).await?;
        if user.is_none() {
            warn!(id, "user not found");
        }
        Ok(user)
    }

    /// Remove the given user from storage
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn delete(&self, user: &User) -> ServiceResult<()> {
        Ok(self.repository.delete(user).await?)
    }

    /// Remove the user with the given id.
    ///
    /// A missing id is skipped silently; the caller gets no failure signal.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: i64) -> ServiceResult<()> {
        match self.repository.find_by_id(id).await? {
            Some(user) => self.delete(&user).await,
            None => {
                warn!(id, "delete skipped, user not found");
                Ok(())
            }
        }
    }

    /// Overwrite the user with the given id from `patch`.
    ///
    /// Full replacement, not a merge: email, age, names and roles are taken
    /// from the patch unconditionally. The password is replaced only when
    /// the patch supplies a non-empty one, and is hashed before storage.
    /// Returns `None` when the id does not exist; a `None` patch returns the
    /// loaded entity without persisting.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: Option<User>) -> ServiceResult<Option<User>> {
        let Some(mut existing) = self.repository.find_by_id(id).await? else {
            warn!(id, "update skipped, user not found");
            return Ok(None);
        };

        let Some(patch) = patch else {
            return Ok(Some(existing));
        };

        if !patch.password.is_empty() {
            existing.password = self.encoder.encode(&patch.password)?;
        }
        existing.set_roles(patch.roles().iter().cloned());
        existing.email = patch.email;
        existing.age = patch.age;
        existing.first_name = patch.first_name;
        existing.last_name = patch.last_name;

        Ok(Some(self.repository.save(&existing).await?))
    }

    /// Look up a user by unique email; absence is a sentinel
    #[instrument(skip(self))]
    pub async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = self.repository.find_user_by_email(email).await?;
        if user.is_none() {
            warn!(email, "user not found");
        }
        Ok(user)
    }

    /// Lookup for the authentication layer.
    ///
    /// The one operation where absence escalates to a hard error carrying
    /// the attempted username.
    #[instrument(skip(self))]
    pub async fn load_user_by_username(&self, username: &str) -> ServiceResult<User> {
        self.repository
            .find_user_by_email(username)
            .await?
            .ok_or_else(|| ServiceError::UsernameNotFound(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    /// In-memory repository double with insertion-ordered iteration
    #[derive(Default)]
    struct InMemoryUserRepository {
        users: Mutex<Vec<User>>,
        next_id: AtomicI64,
        save_calls: AtomicUsize,
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn save(&self, user: &User) -> Result<User> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            let mut users = self.users.lock().unwrap();
            let mut stored = user.clone();
            match stored.id {
                None => {
                    stored.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                    users.push(stored.clone());
                }
                Some(id) => {
                    stored.version += 1;
                    let slot = users
                        .iter_mut()
                        .find(|u| u.id == Some(id))
                        .ok_or_else(|| anyhow::anyhow!("user id={id} missing"))?;
                    *slot = stored.clone();
                }
            }
            Ok(stored)
        }

        async fn find_all(&self) -> Result<Vec<User>> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == Some(id))
                .cloned())
        }

        async fn delete(&self, user: &User) -> Result<()> {
            self.users.lock().unwrap().retain(|u| u.id != user.id);
            Ok(())
        }

        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }
    }

    /// Deterministic encoder double
    struct StubEncoder;

    impl PasswordEncoder for StubEncoder {
        fn encode(&self, raw: &str) -> Result<String> {
            Ok(format!("hashed:{raw}"))
        }

        fn verify(&self, raw: &str, hash: &str) -> Result<bool> {
            Ok(hash == format!("hashed:{raw}"))
        }
    }

    fn service() -> (Arc<InMemoryUserRepository>, UserService) {
        let repository = Arc::new(InMemoryUserRepository::default());
        let service = UserService::new(repository.clone(), Arc::new(StubEncoder));
        (repository, service)
    }

    fn sample_user(email: &str) -> User {
        let mut user = User::with_age(email, "pw", 30);
        user.set_roles([Role::new("ADMIN"), Role::new("USER")]);
        user
    }

    #[tokio::test]
    async fn test_create_then_find_round_trip() {
        let (_, service) = service();

        let created = service.create(sample_user("ada@example.com")).await.unwrap();
        let id = created.id.expect("id assigned on first save");

        let found = service.find(id).await.unwrap().expect("user exists");

        let mut expected = sample_user("ada@example.com");
        expected.password = "hashed:pw".to_string();
        assert_eq!(found, expected);
        assert_eq!(found.role_names(), vec!["ADMIN", "USER"]);
    }

    #[tokio::test]
    async fn test_create_never_stores_plain_text() {
        let (repository, service) = service();

        service.create(sample_user("ada@example.com")).await.unwrap();

        let stored = &repository.find_all().await.unwrap()[0];
        assert_eq!(stored.password, "hashed:pw");
    }

    #[tokio::test]
    async fn test_list_truncates_in_iteration_order() {
        let (_, service) = service();
        for i in 0..5 {
            service
                .create(User::new(format!("user{i}@example.com"), "pw"))
                .await
                .unwrap();
        }

        assert!(service.list(0).await.unwrap().is_empty());
        assert_eq!(service.list(9).await.unwrap().len(), 5);

        let first_three = service.list(3).await.unwrap();
        let emails: Vec<&str> = first_three.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(
            emails,
            vec![
                "user0@example.com",
                "user1@example.com",
                "user2@example.com"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_all_returns_everything() {
        let (_, service) = service();
        for i in 0..3 {
            service
                .create(User::new(format!("user{i}@example.com"), "pw"))
                .await
                .unwrap();
        }

        assert_eq!(service.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_missing_returns_sentinel() {
        let (_, service) = service();

        assert!(service.find(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_fields_wholesale() {
        let (_, service) = service();
        let created = service.create(sample_user("ada@example.com")).await.unwrap();
        let id = created.id.unwrap();

        let mut patch = User::with_profile(
            "lovelace@example.com",
            "",
            36,
            Some("Ada".to_string()),
            None,
        );
        patch.set_roles([Role::new("USER")]);

        let updated = service.update(id, Some(patch)).await.unwrap().unwrap();
        assert_eq!(updated.email, "lovelace@example.com");
        assert_eq!(updated.age, 36);
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
        assert_eq!(updated.last_name, None);
        assert_eq!(updated.role_names(), vec!["USER"]);
    }

    #[tokio::test]
    async fn test_update_with_empty_password_keeps_stored_hash() {
        let (_, service) = service();
        let created = service.create(sample_user("ada@example.com")).await.unwrap();
        let id = created.id.unwrap();

        let patch = User::new("ada@example.com", "");
        let updated = service.update(id, Some(patch)).await.unwrap().unwrap();

        assert_eq!(updated.password, "hashed:pw");
    }

    #[tokio::test]
    async fn test_update_hashes_supplied_password() {
        let (_, service) = service();
        let created = service.create(sample_user("ada@example.com")).await.unwrap();
        let id = created.id.unwrap();

        let patch = User::new("ada@example.com", "secret");
        let updated = service.update(id, Some(patch)).await.unwrap().unwrap();

        assert_eq!(updated.password, "hashed:secret");
    }

    #[tokio::test]
    async fn test_update_missing_id_returns_sentinel() {
        let (_, service) = service();

        let patch = User::new("ghost@example.com", "pw");
        assert!(service.update(404, Some(patch)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_with_no_patch_does_not_persist() {
        let (repository, service) = service();
        let created = service.create(sample_user("ada@example.com")).await.unwrap();
        let id = created.id.unwrap();
        let saves_before = repository.save_calls.load(Ordering::SeqCst);

        let loaded = service.update(id, None).await.unwrap().unwrap();

        assert_eq!(loaded.email, "ada@example.com");
        assert_eq!(repository.save_calls.load(Ordering::SeqCst), saves_before);
    }

    #[tokio::test]
    async fn test_delete_by_id_missing_is_silent() {
        let (repository, service) = service();
        service.create(sample_user("ada@example.com")).await.unwrap();

        service.delete_by_id(404).await.unwrap();

        assert_eq!(repository.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_id_removes_user() {
        let (repository, service) = service();
        let created = service.create(sample_user("ada@example.com")).await.unwrap();

        service.delete_by_id(created.id.unwrap()).await.unwrap();

        assert!(repository.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_value_removes_user() {
        let (repository, service) = service();
        let created = service.create(sample_user("ada@example.com")).await.unwrap();

        service.delete(&created).await.unwrap();

        assert!(repository.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_user_by_email_missing_returns_sentinel() {
        let (_, service) = service();

        let found = service.find_user_by_email("missing@x.com").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_load_user_by_username_missing_is_hard_error() {
        let (_, service) = service();

        let err = service
            .load_user_by_username("missing@x.com")
            .await
            .unwrap_err();
        match err {
            ServiceError::UsernameNotFound(username) => {
                assert_eq!(username, "missing@x.com");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_user_by_username_returns_existing() {
        let (_, service) = service();
        service.create(sample_user("ada@example.com")).await.unwrap();

        let loaded = service
            .load_user_by_username("ada@example.com")
            .await
            .unwrap();
        assert_eq!(loaded.email, "ada@example.com");
    }
}
