use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{HelplineError, HelplineResult};

/// An isolated customer deployment ("bot"). Deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub bot_id: i64,
    pub bot_name: String,
    /// Schema-safe identifier derived from the name at creation; the
    /// tenant's schema is `<slug><suffix>`.
    pub slug: String,
    pub is_active: bool,
    /// Default session inactivity timeout, copied into every new session.
    pub timeout_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(
        bot_id: i64,
        bot_name: impl Into<String>,
        timeout_minutes: i64,
    ) -> HelplineResult<Self> {
        let bot_name = bot_name.into();
        let slug = slugify(&bot_name)?;
        let now = Utc::now();
        Ok(Self {
            bot_id,
            bot_name,
            slug,
            is_active: true,
            timeout_minutes,
            created_at: now,
            modified_at: now,
        })
    }

    /// Schema holding this tenant's collections: slug + configured suffix.
    pub fn schema_name(&self, suffix: &str) -> String {
        format!("{}{}", self.slug, suffix)
    }
}

/// Normalize a tenant name into a schema-safe slug: lowercase alphanumerics
/// and underscores only.
pub fn slugify(name: &str) -> HelplineResult<String> {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if slug.is_empty() || slug.chars().all(|c| c == '_') {
        return Err(HelplineError::InvalidTenantSlug(name.to_string()));
    }
    if slug.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(HelplineError::InvalidTenantSlug(name.to_string()));
    }

    Ok(slug)
}

/// Strip the tenancy suffix from a discovered schema name, yielding the
/// tenant slug.
pub fn slug_from_schema<'a>(schema: &'a str, suffix: &str) -> Option<&'a str> {
    schema.strip_suffix(suffix).filter(|slug| !slug.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Corp").unwrap(), "acme_corp");
        assert_eq!(slugify("acme_corp").unwrap(), "acme_corp");
        assert!(slugify("").is_err());
        assert!(slugify("   ").is_err());
        assert!(slugify("42degrees").is_err());
    }

    #[test]
    fn test_schema_name() {
        let tenant = Tenant::new(1, "Acme Corp", 30).unwrap();
        assert_eq!(tenant.slug, "acme_corp");
        assert_eq!(tenant.schema_name("_helpline"), "acme_corp_helpline");
    }

    #[test]
    fn test_slug_from_schema() {
        assert_eq!(
            slug_from_schema("acme_corp_helpline", "_helpline"),
            Some("acme_corp")
        );
        assert_eq!(slug_from_schema("public", "_helpline"), None);
        assert_eq!(slug_from_schema("_helpline", "_helpline"), None);
    }
}
