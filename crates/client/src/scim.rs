//! SCIM identity management (`preview/scim/v2`).
//!
//! Users and service principals are addressed by their SCIM id, which is
//! looked up from the user name or application id before each write. Group
//! references are SCIM group ids resolved from display names.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use warden_core::{CreateOutcome, Error, Result, ScimApi};

use crate::client::{WorkspaceClient, create_outcome, items, text_field};

const USERS: &str = "preview/scim/v2/Users";
const GROUPS: &str = "preview/scim/v2/Groups";
const SERVICE_PRINCIPALS: &str = "preview/scim/v2/ServicePrincipals";

const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
const SERVICE_PRINCIPAL_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:ServicePrincipal";
const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// A SCIM resource found by filter.
#[derive(Debug, Clone)]
struct ScimRecord {
    id: String,
    /// `[{"value": <group id>}]` as the platform reported it.
    groups: Vec<Value>,
}

impl ScimRecord {
    fn from_value(resource: &Value) -> Result<Self> {
        let id = text_field(resource, "id")?;
        let groups = items(resource, "groups")
            .iter()
            .filter_map(|g| g.get("value").cloned())
            .map(|value| json!({ "value": value }))
            .collect();
        Ok(Self { id, groups })
    }
}

fn group_refs(ids: &[String]) -> Vec<Value> {
    ids.iter().map(|id| json!({ "value": id })).collect()
}

impl WorkspaceClient {
    /// First resource at `endpoint` matching `filter`.
    async fn find_one(&self, endpoint: &str, filter: &str) -> Result<Option<Value>> {
        let response = self
            .scim(Method::GET, endpoint, &[("filter", filter)], None)
            .await?;
        Ok(items(&response, "Resources").first().cloned())
    }

    /// SCIM ids of the named groups.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionFailed` for a name with no matching group.
    async fn group_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let group = self
                .find_one(GROUPS, &format!("displayName eq {name}"))
                .await?
                .ok_or_else(|| Error::resolution_failed("group", name.as_str()))?;
            ids.push(text_field(&group, "id")?);
        }
        Ok(ids)
    }

    async fn user_record(&self, user_name: &str) -> Result<ScimRecord> {
        let user = self
            .find_one(USERS, &format!("userName eq {user_name}"))
            .await?
            .ok_or_else(|| Error::resolution_failed("user", user_name))?;
        ScimRecord::from_value(&user)
    }

    async fn service_principal_record(&self, application_id: &str) -> Result<ScimRecord> {
        let principal = self
            .find_one(
                SERVICE_PRINCIPALS,
                &format!("applicationId eq {application_id}"),
            )
            .await?
            .ok_or_else(|| Error::resolution_failed("service principal", application_id))?;
        ScimRecord::from_value(&principal)
    }
}

#[async_trait]
impl ScimApi for WorkspaceClient {
    async fn add_user(
        &self,
        user_name: &str,
        display_name: Option<&str>,
        groups: &[String],
    ) -> Result<CreateOutcome> {
        let group_ids = self.group_ids(groups).await?;
        let mut body = json!({
            "schemas": [USER_SCHEMA],
            "userName": user_name,
            "groups": group_refs(&group_ids),
        });
        if let (Some(display_name), Some(object)) = (display_name, body.as_object_mut()) {
            object.insert("displayName".to_string(), json!(display_name));
        }
        let outcome = create_outcome(self.scim(Method::POST, USERS, &[], Some(&body)).await)?;
        if outcome == CreateOutcome::Created {
            info!(user = user_name, groups = ?groups, "Added user");
        }
        Ok(outcome)
    }

    async fn update_user(&self, user_name: &str, display_name: &str) -> Result<()> {
        let record = self.user_record(user_name).await?;
        let mut body = json!({
            "schemas": [USER_SCHEMA],
            "userName": user_name,
            "displayName": display_name,
        });
        // PUT replaces the resource; carry the memberships over.
        if let (false, Some(object)) = (record.groups.is_empty(), body.as_object_mut()) {
            object.insert("groups".to_string(), Value::Array(record.groups));
        }
        self.scim(
            Method::PUT,
            &format!("{USERS}/{}", record.id),
            &[],
            Some(&body),
        )
        .await?;
        info!(user = user_name, display_name, "Updated user");
        Ok(())
    }

    async fn delete_user(&self, user_name: &str) -> Result<()> {
        let record = self.user_record(user_name).await?;
        self.scim(Method::DELETE, &format!("{USERS}/{}", record.id), &[], None)
            .await?;
        Ok(())
    }

    async fn find_users(&self, fragment: &str) -> Result<Vec<String>> {
        let filter = format!("userName co {fragment}");
        let response = self
            .scim(Method::GET, USERS, &[("filter", filter.as_str())], None)
            .await?;
        Ok(items(&response, "Resources")
            .iter()
            .filter_map(|user| user.get("userName").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn add_service_principal(
        &self,
        application_id: &str,
        display_name: Option<&str>,
        groups: &[String],
    ) -> Result<CreateOutcome> {
        let group_ids = self.group_ids(groups).await?;
        let mut body = json!({
            "schemas": [SERVICE_PRINCIPAL_SCHEMA],
            "applicationId": application_id,
            "groups": group_refs(&group_ids),
        });
        if let (Some(display_name), Some(object)) = (display_name, body.as_object_mut()) {
            object.insert("displayName".to_string(), json!(display_name));
        }
        let outcome = create_outcome(
            self.scim(Method::POST, SERVICE_PRINCIPALS, &[], Some(&body))
                .await,
        )?;
        if outcome == CreateOutcome::Created {
            info!(application_id, groups = ?groups, "Added service principal");
        }
        Ok(outcome)
    }

    async fn update_service_principal_groups(
        &self,
        application_id: &str,
        groups: &[String],
    ) -> Result<()> {
        let record = self.service_principal_record(application_id).await?;
        let group_ids = self.group_ids(groups).await?;
        let body = json!({
            "schemas": [PATCH_OP_SCHEMA],
            "Operations": [{
                "op": "add",
                "path": "groups",
                "value": group_refs(&group_ids),
            }],
        });
        self.scim(
            Method::PATCH,
            &format!("{SERVICE_PRINCIPALS}/{}", record.id),
            &[],
            Some(&body),
        )
        .await?;
        info!(application_id, groups = ?groups, "Attached service principal to groups");
        Ok(())
    }

    async fn remove_service_principal_from_groups(
        &self,
        application_id: &str,
        groups: &[String],
    ) -> Result<()> {
        let record = self.service_principal_record(application_id).await?;
        let group_ids = self.group_ids(groups).await?;
        let body = json!({
            "schemas": [PATCH_OP_SCHEMA],
            "Operations": [{
                "op": "remove",
                "path": format!("members[value eq \"{}\"]", record.id),
            }],
        });
        for group_id in &group_ids {
            let response = self
                .scim(
                    Method::PATCH,
                    &format!("{GROUPS}/{group_id}"),
                    &[],
                    Some(&body),
                )
                .await?;
            debug!(group_id, response = %response, "Removed member from group");
        }
        warn!(application_id, groups = ?groups, "Removed service principal from groups");
        Ok(())
    }

    async fn delete_service_principal(&self, application_id: &str) -> Result<()> {
        let record = self.service_principal_record(application_id).await?;
        self.scim(
            Method::DELETE,
            &format!("{SERVICE_PRINCIPALS}/{}", record.id),
            &[],
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_service_principals(&self) -> Result<Vec<String>> {
        let response = self
            .scim(Method::GET, SERVICE_PRINCIPALS, &[], None)
            .await?;
        Ok(items(&response, "Resources")
            .iter()
            .filter_map(|sp| sp.get("applicationId").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }
}
