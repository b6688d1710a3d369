//! Organization model - the unit of tenant isolation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Organization entity. Every user belongs to exactly one organization and
/// every tenant-scoped query elsewhere in the platform filters by its id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub org_id: Uuid,
    pub org_name: String,
    pub org_slug: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization.
    pub fn new(org_name: String, org_slug: String) -> Self {
        let now = Utc::now();
        Self {
            org_id: Uuid::new_v4(),
            org_name,
            org_slug,
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// Derive a URL-safe slug from the local part of an email address.
pub fn slug_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let slug: String = local
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "workspace".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_uses_email_local_part() {
        assert_eq!(slug_from_email("alice@example.com"), "alice");
        assert_eq!(slug_from_email("Bob.Smith+x@example.com"), "bob-smith-x");
    }

    #[test]
    fn slug_never_empty() {
        assert_eq!(slug_from_email("@example.com"), "workspace");
        assert_eq!(slug_from_email("...@example.com"), "workspace");
    }
}
