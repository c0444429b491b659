//! Backend-agnostic `Database` trait.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Async persistence interface.
///
/// Values are scoped by an owner id (the session id) and a key, and stored
/// as JSON.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Get a setting value, or `None` if it was never written.
    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Insert or replace a setting value.
    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Delete a setting. Returns whether a row was removed.
    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError>;

    /// Owner ids that have a value stored under `key`, oldest write first.
    async fn list_setting_owners(&self, key: &str) -> Result<Vec<String>, DatabaseError>;
}
