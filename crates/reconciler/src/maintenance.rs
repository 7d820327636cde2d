//! One-off user cleanup.

use tracing::{info, warn};
use warden_core::{Error, Result, ScimApi};

use crate::types::{Pass, PassReport, ReconcileAction};

/// Which users to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelection {
    /// Exactly these user names.
    Names(Vec<String>),
    /// Every user whose name contains this `@domain` fragment.
    Domain(String),
}

impl UserSelection {
    /// Select by e-mail domain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless the domain starts with `@` and names
    /// something after it.
    pub fn domain(domain: impl Into<String>) -> Result<Self> {
        let domain = domain.into();
        if domain.len() > 1 && domain.starts_with('@') {
            Ok(Self::Domain(domain))
        } else {
            Err(Error::invalid_config(format!(
                "domain '{domain}' must look like '@example.com'"
            )))
        }
    }
}

/// Delete the selected users. One failed delete does not stop the rest.
pub async fn delete_users(scim: &dyn ScimApi, selection: &UserSelection) -> PassReport {
    let mut report = PassReport::new(Pass::UserCleanup);
    let users = match selection {
        UserSelection::Names(names) => names.clone(),
        UserSelection::Domain(domain) => match scim.find_users(domain).await {
            Ok(users) => users,
            Err(e) => return report.abort(&e),
        },
    };

    if users.is_empty() {
        info!("No users selected");
        return report;
    }
    warn!(count = users.len(), "Deleting users");

    for user_name in users {
        let result = scim.delete_user(&user_name).await;
        report.record(ReconcileAction::DeleteUser { user_name }, result);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::InMemoryPlatform;

    #[test]
    fn test_domain_must_start_with_at() {
        assert!(UserSelection::domain("@example.com").is_ok());
        assert!(UserSelection::domain("example.com").is_err());
        assert!(UserSelection::domain("@").is_err());
    }

    #[tokio::test]
    async fn test_delete_by_domain() -> Result<()> {
        let platform = InMemoryPlatform::new();
        platform.seed_user("ada@contractor.io", None);
        platform.seed_user("lin@contractor.io", None);
        platform.seed_user("sam@example.com", None);

        let report = delete_users(&platform, &UserSelection::domain("@contractor.io")?).await;

        assert_eq!(report.actions_taken.len(), 2);
        assert!(!platform.has_user("ada@contractor.io"));
        assert!(platform.has_user("sam@example.com"));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_by_name_continues_after_failure() {
        let platform = InMemoryPlatform::new();
        platform.seed_user("sam@example.com", None);

        let selection = UserSelection::Names(vec![
            "ghost@example.com".to_string(),
            "sam@example.com".to_string(),
        ]);
        let report = delete_users(&platform, &selection).await;

        assert_eq!(report.actions_failed.len(), 1);
        assert_eq!(report.actions_taken.len(), 1);
        assert!(!platform.has_user("sam@example.com"));
    }
}
