use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use drivelane_application::{
    CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser, PermissionDescriptor,
    PermissionLookup, RoleAssignment, RoleDefinition,
};
use drivelane_core::{AppError, AppResult};
use drivelane_domain::{EmailAddress, Permission};

#[cfg(test)]
mod tests;

#[derive(Default)]
struct DirectoryState {
    roles: HashMap<String, RoleDefinition>,
    users: HashMap<String, DirectoryUser>,
    assignments: Vec<(String, String)>,
}

/// In-memory directory store for tests and local development.
#[derive(Default)]
pub struct InMemoryDirectoryRepository {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectoryRepository {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn list_catalog(&self) -> AppResult<Vec<PermissionDescriptor>> {
        Ok(Permission::all()
            .iter()
            .map(|permission| PermissionDescriptor {
                key: *permission,
                name: permission.display_name().to_owned(),
            })
            .collect())
    }

    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let state = self.state.read().await;
        let mut roles: Vec<RoleDefinition> = state.roles.values().cloned().collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self.state.read().await.roles.get(role_id).cloned())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let mut state = self.state.write().await;
        if state.roles.values().any(|role| role.name == input.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let role = RoleDefinition {
            role_id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            permissions: Vec::new(),
        };
        state.roles.insert(role.role_id.clone(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.roles.remove(role_id).is_none() {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' was not found"
            )));
        }

        state
            .assignments
            .retain(|(_, assigned_role)| assigned_role != role_id);
        Ok(())
    }

    async fn add_role_permission(&self, role_id: &str, permission: Permission) -> AppResult<()> {
        let mut state = self.state.write().await;
        let role = state.roles.get_mut(role_id).ok_or_else(|| {
            AppError::NotFound(format!("role '{role_id}' was not found"))
        })?;

        if !role.permissions.contains(&permission) {
            role.permissions.push(permission);
        }
        Ok(())
    }

    async fn remove_role_permission(
        &self,
        role_id: &str,
        permission: Permission,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let role = state.roles.get_mut(role_id).ok_or_else(|| {
            AppError::NotFound(format!("role '{role_id}' was not found"))
        })?;

        role.permissions.retain(|granted| *granted != permission);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<DirectoryUser>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|user| user.email == *email)
            .cloned())
    }

    async fn create_user(&self, input: NewDirectoryUser) -> AppResult<DirectoryUser> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|user| user.email == input.email || user.username == input.username)
        {
            return Err(AppError::Conflict(format!(
                "user '{}' already exists",
                input.email.as_str()
            )));
        }

        let user = DirectoryUser {
            user_id: Uuid::new_v4().to_string(),
            email: input.email,
            username: input.username,
            account_type: None,
        };
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(user)
    }

    async fn assign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(user_id) {
            return Err(AppError::NotFound(format!(
                "user '{user_id}' was not found"
            )));
        }
        if !state.roles.contains_key(role_id) {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' was not found"
            )));
        }

        let pair = (user_id.to_owned(), role_id.to_owned());
        if !state.assignments.contains(&pair) {
            state.assignments.push(pair);
        }
        Ok(())
    }

    async fn unassign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        self.state
            .write()
            .await
            .assignments
            .retain(|(assigned_user, assigned_role)| {
                !(assigned_user == user_id && assigned_role == role_id)
            });
        Ok(())
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<RoleAssignment> = state
            .assignments
            .iter()
            .filter_map(|(user_id, role_id)| {
                let user = state.users.get(user_id)?;
                let role = state.roles.get(role_id)?;
                Some(RoleAssignment {
                    user_id: user_id.clone(),
                    email: user.email.clone(),
                    role_id: role_id.clone(),
                    role_name: role.name.clone(),
                })
            })
            .collect();

        assignments.sort_by(|left, right| {
            left.email
                .as_str()
                .cmp(right.email.as_str())
                .then_with(|| left.role_name.cmp(&right.role_name))
        });
        Ok(assignments)
    }

    async fn lookup_permissions_by_email(
        &self,
        email: &EmailAddress,
    ) -> AppResult<PermissionLookup> {
        let state = self.state.read().await;
        let Some(user) = state.users.values().find(|user| user.email == *email) else {
            return Ok(PermissionLookup::NotConfigured);
        };

        let mut grants = Vec::new();
        for (user_id, role_id) in &state.assignments {
            if user_id == &user.user_id
                && let Some(role) = state.roles.get(role_id)
            {
                for permission in &role.permissions {
                    if !grants.contains(permission) {
                        grants.push(*permission);
                    }
                }
            }
        }

        Ok(PermissionLookup::Configured(grants))
    }
}
