//! Common library for the user administration backend
//!
//! This crate provides the shared infrastructure used by the services:
//! PostgreSQL connectivity and the typed errors that go with it.

pub mod database;
pub mod error;
