//! Role model and related functionality

use serde::{Deserialize, Serialize};

/// Role value object
///
/// Roles are shared between users (many-to-many in storage) and are
/// identified by name, e.g. "ADMIN" or "USER".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
}

impl Role {
    /// Create a new role with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
