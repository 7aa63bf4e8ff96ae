use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use drivelane_application::{
    CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser, PermissionDescriptor,
    PermissionLookup, RoleAssignment, RoleDefinition,
};
use drivelane_core::{AppError, AppResult};
use drivelane_domain::{EmailAddress, Permission};

mod shapes;

/// Directory adapter for deployments where the dealership identity service
/// owns the role and user graph.
///
/// The identity service's permission payloads are not stable across
/// versions, so reads go through the ordered shape adapters in [`shapes`];
/// transport failures surface as `Unavailable` so the resolver can degrade
/// instead of locking users out.
pub struct HttpDirectoryClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpDirectoryClient {
    /// Creates a client against the identity service base URL.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: Url) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url.join(path).map_err(|error| {
            AppError::Internal(format!("invalid directory endpoint '{path}': {error}"))
        })
    }

    async fn get_json(&self, path: &str) -> AppResult<Value> {
        let url = self.endpoint(path)?;
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("directory request failed: {error}"))
            })?;

        read_json(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> AppResult<Value> {
        let url = self.endpoint(path)?;
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("directory request failed: {error}"))
            })?;

        read_json(response).await
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let url = self.endpoint(path)?;
        let response = self
            .http_client
            .delete(url)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("directory request failed: {error}"))
            })?;

        map_status(&response)?;
        Ok(())
    }

    /// Bulk fallback for when the per-user lookup endpoint is unreachable.
    ///
    /// Scans the all-users summary for the email and unions the permission
    /// keys embedded in the matching entry's roles.
    async fn lookup_from_summary(&self, email: &EmailAddress) -> AppResult<PermissionLookup> {
        let summary = self.get_json("user-roles-summary").await?;

        let users = summary
            .get("users")
            .and_then(Value::as_array)
            .or_else(|| summary.as_array())
            .ok_or_else(|| {
                AppError::Internal("user-roles-summary payload has no user list".to_owned())
            })?;

        let Some(entry) = users.iter().find(|entry| {
            entry.get("email").and_then(Value::as_str) == Some(email.as_str())
        }) else {
            return Ok(PermissionLookup::NotConfigured);
        };

        let mut grants = Vec::new();
        if let Some(roles) = entry.get("roles").and_then(Value::as_array) {
            for role in roles {
                if let Some(value) = role.get("permissions")
                    && let Some(keys) = shapes::extract_permission_keys(value)
                {
                    grants.extend(shapes::parse_known_permissions(&keys));
                }
            }
        }

        grants.sort();
        grants.dedup();
        Ok(PermissionLookup::Configured(grants))
    }
}

#[derive(Debug, Deserialize)]
struct RemoteRole {
    id: Value,
    name: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    permissions: Value,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Value,
    email: String,
    username: String,
}

#[async_trait]
impl DirectoryRepository for HttpDirectoryClient {
    async fn list_catalog(&self) -> AppResult<Vec<PermissionDescriptor>> {
        let payload = self.get_json("permissions").await?;
        let entries = payload.as_array().ok_or_else(|| {
            AppError::Internal("permissions payload is not a list".to_owned())
        })?;

        let mut catalog = Vec::new();
        for entry in entries {
            let Some(key) = entry.get("key").and_then(Value::as_str) else {
                continue;
            };
            // Keys this build does not know are skipped, not fatal.
            let Ok(permission) = Permission::from_transport(key) else {
                warn!(key, "skipping unknown permission in remote catalog");
                continue;
            };

            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(permission.display_name());
            catalog.push(PermissionDescriptor {
                key: permission,
                name: name.to_owned(),
            });
        }

        Ok(catalog)
    }

    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let payload = self.get_json("roles").await?;
        let entries: Vec<RemoteRole> = serde_json::from_value(payload).map_err(|error| {
            AppError::Internal(format!("roles payload failed to parse: {error}"))
        })?;

        Ok(entries.into_iter().map(role_from_remote).collect())
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self
            .list_roles()
            .await?
            .into_iter()
            .find(|role| role.role_id == role_id))
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let payload = self
            .post_json(
                "roles",
                &serde_json::json!({
                    "name": input.name,
                    "desc": input.description,
                }),
            )
            .await?;

        let remote: RemoteRole = serde_json::from_value(payload).map_err(|error| {
            AppError::Internal(format!("create-role response failed to parse: {error}"))
        })?;
        Ok(role_from_remote(remote))
    }

    async fn delete_role(&self, role_id: &str) -> AppResult<()> {
        self.delete(&format!("roles/{role_id}")).await
    }

    async fn add_role_permission(&self, role_id: &str, permission: Permission) -> AppResult<()> {
        self.post_json(
            "role-permissions",
            &serde_json::json!({
                "roleId": role_id,
                "permissionId": permission.as_str(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn remove_role_permission(
        &self,
        role_id: &str,
        permission: Permission,
    ) -> AppResult<()> {
        self.delete(&format!("role-permissions/{role_id}/{}", permission.as_str()))
            .await
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<DirectoryUser>> {
        let payload = self.get_json("users").await?;
        let entries: Vec<RemoteUser> = serde_json::from_value(payload).map_err(|error| {
            AppError::Internal(format!("users payload failed to parse: {error}"))
        })?;

        for entry in entries {
            if entry.email == email.as_str() {
                return Ok(Some(DirectoryUser {
                    user_id: id_to_string(&entry.id),
                    email: EmailAddress::new(entry.email)?,
                    username: entry.username,
                    account_type: None,
                }));
            }
        }

        Ok(None)
    }

    async fn create_user(&self, input: NewDirectoryUser) -> AppResult<DirectoryUser> {
        let payload = self
            .post_json(
                "users",
                &serde_json::json!({
                    "email": input.email.as_str(),
                    "name": input.display_name,
                    "username": input.username,
                }),
            )
            .await?;

        let remote: RemoteUser = serde_json::from_value(payload).map_err(|error| {
            AppError::Internal(format!("create-user response failed to parse: {error}"))
        })?;

        Ok(DirectoryUser {
            user_id: id_to_string(&remote.id),
            email: EmailAddress::new(remote.email)?,
            username: remote.username,
            account_type: None,
        })
    }

    async fn assign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        self.post_json(
            "user-roles",
            &serde_json::json!({
                "userId": user_id,
                "roleId": role_id,
            }),
        )
        .await?;
        Ok(())
    }

    async fn unassign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        self.delete(&format!("user-roles/{user_id}/{role_id}")).await
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let summary = self.get_json("user-roles-summary").await?;
        let users = summary
            .get("users")
            .and_then(Value::as_array)
            .or_else(|| summary.as_array())
            .ok_or_else(|| {
                AppError::Internal("user-roles-summary payload has no user list".to_owned())
            })?;

        let mut assignments = Vec::new();
        for entry in users {
            let Some(email) = entry.get("email").and_then(Value::as_str) else {
                continue;
            };
            let Ok(email) = EmailAddress::new(email) else {
                continue;
            };
            let user_id = entry.get("id").map(id_to_string).unwrap_or_default();

            if let Some(roles) = entry.get("roles").and_then(Value::as_array) {
                for role in roles {
                    let Some(role_name) = role.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    let role_id = role.get("id").map(id_to_string).unwrap_or_default();
                    assignments.push(RoleAssignment {
                        user_id: user_id.clone(),
                        email: email.clone(),
                        role_id,
                        role_name: role_name.to_owned(),
                    });
                }
            }
        }

        Ok(assignments)
    }

    async fn lookup_permissions_by_email(
        &self,
        email: &EmailAddress,
    ) -> AppResult<PermissionLookup> {
        let path = format!("users/email/{}/permissions", email.as_str());
        let payload = match self.get_json(&path).await {
            Ok(payload) => payload,
            Err(AppError::NotFound(_)) => return Ok(PermissionLookup::NotConfigured),
            Err(AppError::Unavailable(error)) => {
                warn!(
                    email = email.as_str(),
                    %error,
                    "per-user permission endpoint unreachable; trying bulk summary"
                );
                return self.lookup_from_summary(email).await;
            }
            Err(error) => return Err(error),
        };

        let keys = shapes::extract_permission_keys(&payload).ok_or_else(|| {
            AppError::Internal(format!(
                "permission payload for '{}' matched no known shape",
                email.as_str()
            ))
        })?;

        Ok(PermissionLookup::Configured(
            shapes::parse_known_permissions(&keys),
        ))
    }
}

async fn read_json(response: reqwest::Response) -> AppResult<Value> {
    map_status(&response)?;
    response.json::<Value>().await.map_err(|error| {
        AppError::Internal(format!("directory response was not valid JSON: {error}"))
    })
}

fn map_status(response: &reqwest::Response) -> AppResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let url = response.url().clone();
    match status {
        reqwest::StatusCode::NOT_FOUND => {
            Err(AppError::NotFound(format!("directory resource '{url}' was not found")))
        }
        reqwest::StatusCode::CONFLICT => {
            Err(AppError::Conflict(format!("directory rejected '{url}' as a duplicate")))
        }
        status if status.is_server_error() => Err(AppError::Unavailable(format!(
            "directory returned status {status} for '{url}'"
        ))),
        status => Err(AppError::Internal(format!(
            "directory returned status {status} for '{url}'"
        ))),
    }
}

fn role_from_remote(remote: RemoteRole) -> RoleDefinition {
    let permissions = shapes::extract_permission_keys(&remote.permissions)
        .map(|keys| shapes::parse_known_permissions(&keys))
        .unwrap_or_default();

    RoleDefinition {
        role_id: id_to_string(&remote.id),
        name: remote.name,
        description: remote.desc,
        permissions,
    }
}

/// Identity services disagree on whether ids are strings or numbers.
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}
