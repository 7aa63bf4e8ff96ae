use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use drivelane_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use drivelane_domain::{AuditAction, EmailAddress, Permission, synthesize_username};
use tracing::warn;

use crate::audit::{AuditEvent, AuditRepository};
use crate::directory_ports::{
    CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser, PermissionDescriptor,
    ResolutionCache, RoleAssignment, RoleDefinition,
};
use crate::permission_resolver::PermissionResolver;

#[cfg(test)]
mod tests;

/// Outcome of a diff-based role permission sync.
///
/// Partial failures are first-class: when some link calls fail while others
/// succeed, the counts are reported to the administrator instead of being
/// hidden behind an overall success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSyncReport {
    /// Role the sync targeted.
    pub role_id: String,
    /// Permissions newly linked.
    pub added: Vec<Permission>,
    /// Permissions unlinked.
    pub removed: Vec<Permission>,
    /// Link calls that failed; retrying the sync retries only these.
    pub failed_to_add: Vec<Permission>,
    /// Unlink calls that failed.
    pub failed_to_remove: Vec<Permission>,
}

impl PermissionSyncReport {
    /// Returns true when every computed delta was applied.
    #[must_use]
    pub fn is_fully_applied(&self) -> bool {
        self.failed_to_add.is_empty() && self.failed_to_remove.is_empty()
    }
}

/// Application service for role and assignment administration.
#[derive(Clone)]
pub struct RoleAdminService {
    resolver: PermissionResolver,
    directory: Arc<dyn DirectoryRepository>,
    cache: Arc<dyn ResolutionCache>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RoleAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        resolver: PermissionResolver,
        directory: Arc<dyn DirectoryRepository>,
        cache: Arc<dyn ResolutionCache>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            resolver,
            directory,
            cache,
            audit_repository,
        }
    }

    /// Returns the permission catalog for administrative views.
    pub async fn list_permission_catalog(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<PermissionDescriptor>> {
        self.resolver
            .require_permission(actor, Permission::ManageRoles)
            .await?;

        self.directory.list_catalog().await
    }

    /// Returns all roles with effective grants.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<RoleDefinition>> {
        self.resolver
            .require_permission(actor, Permission::ManageRoles)
            .await?;

        self.directory.list_roles().await
    }

    /// Creates a role with an empty permission set.
    ///
    /// A duplicate case-sensitive name is surfaced as a conflict, never
    /// silently merged.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.resolver
            .require_permission(actor, Permission::ManageRoles)
            .await?;

        let input = CreateRoleInput {
            name: NonEmptyString::new(input.name)?.into(),
            description: input.description,
        };
        let role = self.directory.create_role(input).await?;

        self.append_audit(
            actor,
            AuditAction::RoleCreated,
            "role",
            role.role_id.clone(),
            Some(format!("created role '{}'", role.name)),
        )
        .await?;

        Ok(role)
    }

    /// Replaces a role's permission set via an explicit diff.
    ///
    /// The added/removed deltas are computed before any link call is issued,
    /// so an interrupted sync can be retried with only the failed subset.
    /// Users holding the role see the change on their next resolution.
    pub async fn set_role_permissions(
        &self,
        actor: &UserIdentity,
        role_id: &str,
        desired: Vec<Permission>,
    ) -> AppResult<PermissionSyncReport> {
        self.resolver
            .require_permission(actor, Permission::ManageRoles)
            .await?;

        let role = self
            .directory
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        let current: BTreeSet<Permission> = role.permissions.iter().copied().collect();
        let desired: BTreeSet<Permission> = desired.into_iter().collect();

        let mut report = PermissionSyncReport {
            role_id: role_id.to_owned(),
            added: Vec::new(),
            removed: Vec::new(),
            failed_to_add: Vec::new(),
            failed_to_remove: Vec::new(),
        };

        for permission in desired.difference(&current) {
            match self.directory.add_role_permission(role_id, *permission).await {
                Ok(()) => report.added.push(*permission),
                Err(error) => {
                    warn!(
                        role_id,
                        permission = permission.as_str(),
                        %error,
                        "failed to link role permission"
                    );
                    report.failed_to_add.push(*permission);
                }
            }
        }

        for permission in current.difference(&desired) {
            match self
                .directory
                .remove_role_permission(role_id, *permission)
                .await
            {
                Ok(()) => report.removed.push(*permission),
                Err(error) => {
                    warn!(
                        role_id,
                        permission = permission.as_str(),
                        %error,
                        "failed to unlink role permission"
                    );
                    report.failed_to_remove.push(*permission);
                }
            }
        }

        // The edit changes an unknown set of users' effective permissions.
        self.cache.invalidate_all().await;

        self.append_audit(
            actor,
            AuditAction::RolePermissionsReplaced,
            "role",
            role_id.to_owned(),
            Some(format!(
                "replaced permissions of role '{}': {} added, {} removed, {} failed",
                role.name,
                report.added.len(),
                report.removed.len(),
                report.failed_to_add.len() + report.failed_to_remove.len()
            )),
        )
        .await?;

        Ok(report)
    }

    /// Deletes a role, cascading over every assignment referencing it.
    pub async fn delete_role(&self, actor: &UserIdentity, role_id: &str) -> AppResult<()> {
        self.resolver
            .require_permission(actor, Permission::ManageRoles)
            .await?;

        let role = self
            .directory
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        self.directory.delete_role(role_id).await?;
        self.cache.invalidate_all().await;

        self.append_audit(
            actor,
            AuditAction::RoleDeleted,
            "role",
            role_id.to_owned(),
            Some(format!(
                "deleted role '{}' and its assignments",
                role.name
            )),
        )
        .await
    }

    /// Assigns a role to a user, provisioning the user on first contact.
    ///
    /// The create-user-then-link sequence is not atomic at the store layer;
    /// it is treated as one logical transaction here: a lost creation race
    /// is absorbed by re-reading the user, and the store deduplicates the
    /// final link, so the whole operation is safe to retry as a unit.
    pub async fn assign_role_to_user(
        &self,
        actor: &UserIdentity,
        email: &str,
        role_id: &str,
    ) -> AppResult<()> {
        self.resolver
            .require_permission(actor, Permission::ManageUsers)
            .await?;

        let email = EmailAddress::new(email)?;
        self.directory
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        let user = match self.directory.find_user_by_email(&email).await? {
            Some(user) => user,
            None => self.provision_user(actor, &email).await?,
        };

        self.directory.assign_role(&user.user_id, role_id).await?;
        self.cache.invalidate(email.as_str()).await;

        self.append_audit(
            actor,
            AuditAction::RoleAssigned,
            "user_role",
            format!("{}:{role_id}", email.as_str()),
            Some(format!("assigned role '{role_id}' to '{}'", email.as_str())),
        )
        .await
    }

    /// Removes a role assignment from a user.
    pub async fn unassign_role_from_user(
        &self,
        actor: &UserIdentity,
        email: &str,
        role_id: &str,
    ) -> AppResult<()> {
        self.resolver
            .require_permission(actor, Permission::ManageUsers)
            .await?;

        let email = EmailAddress::new(email)?;
        let user = self
            .directory
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("user '{}' was not found", email.as_str()))
            })?;

        self.directory.unassign_role(&user.user_id, role_id).await?;
        self.cache.invalidate(email.as_str()).await;

        self.append_audit(
            actor,
            AuditAction::RoleUnassigned,
            "user_role",
            format!("{}:{role_id}", email.as_str()),
            Some(format!(
                "removed role '{role_id}' from '{}'",
                email.as_str()
            )),
        )
        .await
    }

    /// Lists current user-to-role assignments.
    pub async fn list_role_assignments(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.resolver
            .require_permission(actor, Permission::ManageUsers)
            .await?;

        self.directory.list_role_assignments().await
    }

    async fn provision_user(
        &self,
        actor: &UserIdentity,
        email: &EmailAddress,
    ) -> AppResult<DirectoryUser> {
        let input = NewDirectoryUser {
            email: email.clone(),
            display_name: email.local_part().to_owned(),
            username: synthesize_username(email, Utc::now().timestamp()),
        };

        let user = match self.directory.create_user(input).await {
            Ok(user) => user,
            Err(AppError::Conflict(_)) => {
                // Another admin won the provisioning race; the row must
                // exist now.
                self.directory
                    .find_user_by_email(email)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "user '{}' conflicted on create but cannot be read back",
                            email.as_str()
                        ))
                    })?
            }
            Err(error) => return Err(error),
        };

        self.append_audit(
            actor,
            AuditAction::UserProvisioned,
            "directory_user",
            user.user_id.clone(),
            Some(format!("provisioned user '{}'", email.as_str())),
        )
        .await?;

        Ok(user)
    }

    async fn append_audit(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                actor_email: actor.email().to_owned(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id,
                detail,
            })
            .await
    }
}
