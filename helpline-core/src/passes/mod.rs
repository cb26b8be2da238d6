//! Recurring reconciliation passes.
//!
//! Each pass owns one concern and is invoked on a fixed interval by the
//! coordinator. All passes share the same shape: discover tenants, walk
//! their sessions, and isolate failures at the smallest enclosing scope so
//! one bad tenant or session never starves the rest. A structured warning
//! is emitted for every skipped item; nothing is swallowed silently.

pub mod agent_expiry;
pub mod agent_sentiment;
pub mod assignment;
pub mod reclamation;
pub mod sentiment;
pub mod summary;
pub mod tags;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::HelplineResult;
use crate::models::Tenant;
use crate::store::{Directory, TenantStore};

pub use agent_expiry::AgentExpiryPass;
pub use agent_sentiment::AgentSentimentPass;
pub use assignment::AssignmentPass;
pub use reclamation::MemoryReclamationPass;
pub use sentiment::SentimentPass;
pub use summary::SummaryPass;
pub use tags::TagsPass;

/// Resolve every discovered tenant schema to an active tenant record and
/// its store. Schemas without an active tenant record are skipped
/// explicitly; a store that fails to open skips that tenant for this pass.
pub(crate) async fn discover_tenants(
    directory: &dyn Directory,
) -> HelplineResult<Vec<(Tenant, Arc<dyn TenantStore>)>> {
    let mut tenants = Vec::new();

    for slug in directory.list_tenant_slugs().await? {
        let tenant = match directory.find_active_tenant(&slug).await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => {
                debug!(%slug, "schema has no active tenant record, skipping");
                continue;
            }
            Err(error) => {
                warn!(%slug, %error, "tenant lookup failed, skipping");
                continue;
            }
        };

        match directory.tenant_store(&slug).await {
            Ok(store) => tenants.push((tenant, store)),
            Err(error) => warn!(%slug, %error, "tenant store unavailable, skipping"),
        }
    }

    Ok(tenants)
}
