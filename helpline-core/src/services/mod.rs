//! Admin-facing operations consumed by the CLI: tenant provisioning and
//! agent login/logout.

pub mod agent_service;
pub mod tenant_service;

pub use agent_service::AgentService;
pub use tenant_service::TenantService;
