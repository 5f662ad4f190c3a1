//! User model and related functionality

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Role;

/// Prefix applied to role names when they are exposed as authorities
pub const ROLE_PREFIX: &str = "ROLE_";

/// User entity
///
/// `id` and `version` belong to the storage layer: a freshly constructed
/// user has no id and version 0, both assigned on first save. The version
/// column backs the optimistic-lock check in the repository. The password
/// field holds the hash once the user has gone through the service layer.
///
/// Equality is value-based: email, password, age, names and the role set,
/// with id, version and timestamps excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub version: i32,
    pub email: String,
    pub password: String,
    pub age: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(deserialize_with = "deserialize_roles")]
    roles: Vec<Role>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Duplicates are dropped; insertion order is preserved
fn dedup_roles(roles: impl IntoIterator<Item = Role>) -> Vec<Role> {
    let mut deduped: Vec<Role> = Vec::new();
    for role in roles {
        if !deduped.contains(&role) {
            deduped.push(role);
        }
    }
    deduped
}

// Deserialization must uphold the same set invariant as `set_roles`;
// a duplicated role would make equal users hash differently.
fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<Role>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let roles = Vec::<Role>::deserialize(deserializer)?;
    Ok(dedup_roles(roles))
}

impl User {
    /// Create a user with email and password only
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_profile(email, password, 0, None, None)
    }

    /// Create a user with email, password and age
    pub fn with_age(email: impl Into<String>, password: impl Into<String>, age: i32) -> Self {
        Self::with_profile(email, password, age, None, None)
    }

    /// Designated initializer: all construction paths end up here.
    /// Roles start empty until explicitly set.
    pub fn with_profile(
        email: impl Into<String>,
        password: impl Into<String>,
        age: i32,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        Self {
            id: None,
            version: 0,
            email: email.into(),
            password: password.into(),
            age,
            first_name,
            last_name,
            roles: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Replace the role collection wholesale.
    ///
    /// Duplicates are dropped; insertion order is preserved.
    pub fn set_roles(&mut self, roles: impl IntoIterator<Item = Role>) {
        self.roles = dedup_roles(roles);
    }

    /// The role collection in insertion order
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Plain role names, without prefix, in insertion order
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// Granted authorities: one `ROLE_`-prefixed token per role.
    ///
    /// Order is not significant to callers.
    pub fn authorities(&self) -> Vec<String> {
        let authorities: Vec<String> = self
            .roles
            .iter()
            .map(|r| format!("{ROLE_PREFIX}{}", r.name))
            .collect();
        debug!(?authorities, "computed granted authorities");
        authorities
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.email == other.email
            && self.password == other.password
            && self.age == other.age
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            // role sets must contain each other; iteration order is irrelevant
            && self.roles.iter().all(|r| other.roles.contains(r))
            && other.roles.iter().all(|r| self.roles.contains(r))
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.email.hash(state);
        self.password.hash(state);
        self.age.hash(state);
        self.first_name.hash(state);
        self.last_name.hash(state);
        // order-independent fold so equal role sets hash identically
        let mut combined: u64 = 0;
        for role in &self.roles {
            let mut hasher = DefaultHasher::new();
            role.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        state.write_u64(combined);
    }
}
