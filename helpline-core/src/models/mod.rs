pub mod agent;
pub mod profile;
pub mod session;
pub mod summary;
pub mod tenant;
pub mod workspace;

pub use agent::{Agent, AgentKey};
pub use profile::{Channel, Profile};
pub use session::{
    format_legacy_timestamp, parse_legacy_timestamp, AgentExpiry, EndReason, RoleEntry,
    SessionRecord, SessionState, TurnKind, LEGACY_TIMESTAMP_FORMAT,
};
pub use summary::Summary;
pub use tenant::{slug_from_schema, slugify, Tenant};
pub use workspace::{LlmKind, Workspace, WorkspaceSettings};
