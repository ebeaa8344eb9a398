pub mod sqlite;

use async_trait::async_trait;
use ipolens_core::{IpoAnalysis, LogAction, LogEntry, Result, User};

pub use sqlite::SqliteStore;

/// A log entry about to be appended. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub username: String,
    pub action: LogAction,
    pub details: String,
    pub metadata: Option<serde_json::Value>,
}

/// Data access for accounts, saved analyses and the audit trail.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create an account. Fails with `InvalidOperation` when the username
    /// is already taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User>;

    async fn find_user(&self, username: &str) -> Result<Option<User>>;

    /// Stored password hash, for credential checks. Never leaves this layer
    /// except through this call.
    async fn password_hash(&self, username: &str) -> Result<Option<String>>;

    /// Flip the account to premium and reset its usage counter.
    async fn set_premium(&self, username: &str) -> Result<User>;

    async fn increment_usage(&self, username: &str) -> Result<()>;

    async fn save_analysis(
        &self,
        username: &str,
        analysis: &IpoAnalysis,
        subscription: Option<&str>,
    ) -> Result<()>;

    /// Saved reports for one account, newest first.
    async fn history(&self, username: &str, limit: usize) -> Result<Vec<IpoAnalysis>>;

    async fn append_log(&self, entry: NewLogEntry) -> Result<LogEntry>;

    /// Most recent audit entries, newest first.
    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>>;

    async fn clear_logs(&self) -> Result<()>;
}
