//! User administration models

pub mod role;
pub mod user;

// Re-export for convenience
pub use role::Role;
pub use user::{ROLE_PREFIX, User};
