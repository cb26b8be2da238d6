//! Error types for the Helpline core library.
//!
//! This module provides a unified error handling system for all coordinator
//! operations, including database access, queue manipulation, external
//! classifier/LLM calls, and tenant administration.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Database | Connection, query, migration errors |
//! | E2001-E2099 | Config | Environment, config file, and validation errors |
//! | E3001-E3099 | Tenant | Tenant/workspace directory errors |
//! | E4001-E4099 | Session | Session lifecycle and state errors |
//! | E5001-E5099 | Queue | Queue store errors |
//! | E6001-E6099 | External | Classifier/LLM request, parse, and timeout errors |
//! | E7001-E7099 | Agent | Agent identity and login/logout errors |
//! | E9001-E9099 | General | Internal, IO, serialization errors |

use thiserror::Error;

/// The main error type for the Helpline core library.
#[derive(Debug, Error)]
pub enum HelplineError {
    // ========================================================================
    // Database Errors (E1001-E1099)
    // ========================================================================
    /// Failed to establish database connection
    #[error("[E1001] Database connection failed: {0}")]
    DatabaseConnectionFailed(String),

    /// Database query execution failed
    #[error("[E1002] Database query failed: {0}")]
    DatabaseQueryFailed(String),

    /// Database migration failed
    #[error("[E1003] Database migration failed: {0}")]
    DatabaseMigrationFailed(String),

    /// Database pool exhausted or unavailable
    #[error("[E1004] Database pool unavailable: {0}")]
    DatabasePoolUnavailable(String),

    // ========================================================================
    // Configuration Errors (E2001-E2099)
    // ========================================================================
    /// Required environment variable is missing
    #[error("[E2001] Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Configuration file parse error
    #[error("[E2002] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// Invalid configuration value
    #[error("[E2003] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    // ========================================================================
    // Tenant Directory Errors (E3001-E3099)
    // ========================================================================
    /// No active tenant record behind a discovered tenant schema
    #[error("[E3001] Tenant not found: {0}")]
    TenantNotFound(String),

    /// Tenant already provisioned
    #[error("[E3002] Tenant already exists: {0}")]
    TenantAlreadyExists(String),

    /// Workspace not found within a tenant
    #[error("[E3003] Workspace not found: bot {bot_id}, workspace {workspace_id}")]
    WorkspaceNotFound { bot_id: i64, workspace_id: i64 },

    /// Workspace settings record missing
    #[error("[E3004] Workspace settings not found: bot {bot_id}, workspace {workspace_id}")]
    SettingsNotFound { bot_id: i64, workspace_id: i64 },

    /// Tenant slug cannot be turned into a schema name
    #[error("[E3005] Invalid tenant slug: {0}")]
    InvalidTenantSlug(String),

    // ========================================================================
    // Session Errors (E4001-E4099)
    // ========================================================================
    /// Session not found
    #[error("[E4001] Session not found: {0}")]
    SessionNotFound(String),

    /// Session has already ended
    #[error("[E4002] Session has already ended: {0}")]
    SessionAlreadyEnded(String),

    /// Invalid session state transition
    #[error("[E4003] Invalid session state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Role entry timestamp could not be parsed
    #[error("[E4004] Invalid turn timestamp '{0}'")]
    InvalidTurnTimestamp(String),

    // ========================================================================
    // Queue Errors (E5001-E5099)
    // ========================================================================
    /// Queue store unreachable or operation failed
    #[error("[E5001] Queue store unavailable: {0}")]
    QueueUnavailable(String),

    // ========================================================================
    // External API Errors (E6001-E6099)
    // ========================================================================
    /// Classifier or LLM request failed
    #[error("[E6001] API request failed: {0}")]
    ApiRequestFailed(String),

    /// Classifier or LLM response could not be parsed
    #[error("[E6002] Failed to parse API response: {0}")]
    ApiParseError(String),

    /// External call timed out
    #[error("[E6003] API request timed out: {0}")]
    ApiTimeout(String),

    /// No chat provider configured for a workspace
    #[error("[E6004] Unsupported chat provider: {0}")]
    UnsupportedProvider(String),

    // ========================================================================
    // Agent Errors (E7001-E7099)
    // ========================================================================
    /// Agent not found or not active
    #[error("[E7001] Agent not found: {0}")]
    AgentNotFound(String),

    /// Agent identity already logged in
    #[error("[E7002] Agent already active: {0}")]
    AgentAlreadyActive(String),

    /// Agent composite key could not be parsed
    #[error("[E7003] Invalid agent key: {0}")]
    InvalidAgentKey(String),

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    /// Internal error (catch-all for unexpected conditions)
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("[E9002] IO error: {0}")]
    IoError(String),

    /// Serialization/deserialization error
    #[error("[E9003] Serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias for Helpline operations.
pub type HelplineResult<T> = Result<T, HelplineError>;

// ============================================================================
// From trait implementations for seamless error propagation
// ============================================================================

impl From<sqlx::Error> for HelplineError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => HelplineError::DatabasePoolUnavailable(err.to_string()),
            sqlx::Error::PoolClosed => {
                HelplineError::DatabasePoolUnavailable("Connection pool is closed".to_string())
            }
            sqlx::Error::RowNotFound => {
                HelplineError::DatabaseQueryFailed("Row not found".to_string())
            }
            sqlx::Error::Configuration(_) => {
                HelplineError::DatabaseConnectionFailed(err.to_string())
            }
            sqlx::Error::Database(db_err) => HelplineError::DatabaseQueryFailed(db_err.to_string()),
            _ => HelplineError::DatabaseQueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for HelplineError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        HelplineError::DatabaseMigrationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for HelplineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HelplineError::ApiTimeout(err.to_string())
        } else if err.is_decode() {
            HelplineError::ApiParseError(err.to_string())
        } else {
            HelplineError::ApiRequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HelplineError {
    fn from(err: serde_json::Error) -> Self {
        HelplineError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for HelplineError {
    fn from(err: std::io::Error) -> Self {
        HelplineError::IoError(err.to_string())
    }
}

impl From<config::ConfigError> for HelplineError {
    fn from(err: config::ConfigError) -> Self {
        HelplineError::ConfigParseError(err.to_string())
    }
}

// ============================================================================
// Error categorization helpers
// ============================================================================

impl HelplineError {
    /// Returns true if this error is transient and the operation is expected
    /// to succeed when the owning pass retries it on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HelplineError::DatabaseConnectionFailed(_)
                | HelplineError::DatabasePoolUnavailable(_)
                | HelplineError::QueueUnavailable(_)
                | HelplineError::ApiRequestFailed(_)
                | HelplineError::ApiTimeout(_)
        )
    }

    /// Returns a stable error code suitable for logging or external reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            HelplineError::DatabaseConnectionFailed(_) => "E1001",
            HelplineError::DatabaseQueryFailed(_) => "E1002",
            HelplineError::DatabaseMigrationFailed(_) => "E1003",
            HelplineError::DatabasePoolUnavailable(_) => "E1004",
            HelplineError::MissingEnvVar(_) => "E2001",
            HelplineError::ConfigParseError(_) => "E2002",
            HelplineError::InvalidConfigValue { .. } => "E2003",
            HelplineError::TenantNotFound(_) => "E3001",
            HelplineError::TenantAlreadyExists(_) => "E3002",
            HelplineError::WorkspaceNotFound { .. } => "E3003",
            HelplineError::SettingsNotFound { .. } => "E3004",
            HelplineError::InvalidTenantSlug(_) => "E3005",
            HelplineError::SessionNotFound(_) => "E4001",
            HelplineError::SessionAlreadyEnded(_) => "E4002",
            HelplineError::InvalidStateTransition { .. } => "E4003",
            HelplineError::InvalidTurnTimestamp(_) => "E4004",
            HelplineError::QueueUnavailable(_) => "E5001",
            HelplineError::ApiRequestFailed(_) => "E6001",
            HelplineError::ApiParseError(_) => "E6002",
            HelplineError::ApiTimeout(_) => "E6003",
            HelplineError::UnsupportedProvider(_) => "E6004",
            HelplineError::AgentNotFound(_) => "E7001",
            HelplineError::AgentAlreadyActive(_) => "E7002",
            HelplineError::InvalidAgentKey(_) => "E7003",
            HelplineError::Internal(_) => "E9001",
            HelplineError::IoError(_) => "E9002",
            HelplineError::SerializationError(_) => "E9003",
        }
    }
}
