use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drivelane_core::{AccountType, AppResult};
use drivelane_domain::{EmailAddress, Permission, ResolvedPermissionSet};

/// Catalog projection returned to administrative views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDescriptor {
    /// Stable capability key.
    pub key: Permission,
    /// Human-readable name.
    pub name: String,
}

/// Role definition returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    /// Stable role identifier.
    pub role_id: String,
    /// Unique role name (case-sensitive).
    pub name: String,
    /// Optional administrator-supplied description.
    pub description: Option<String>,
    /// Effective role grants.
    pub permissions: Vec<Permission>,
}

/// Input payload for creating roles.
///
/// New roles always start with an empty permission set; grants are attached
/// afterwards through the permission sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name (case-sensitive).
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// A user row in the directory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// Stable user identifier.
    pub user_id: String,
    /// Email join key.
    pub email: EmailAddress,
    /// Synthetic unique username.
    pub username: String,
    /// Coarse account type, when the directory knows it.
    pub account_type: Option<AccountType>,
}

/// Input payload for first-time user provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDirectoryUser {
    /// Email join key.
    pub email: EmailAddress,
    /// Display name.
    pub display_name: String,
    /// Caller-synthesized unique username.
    pub username: String,
}

/// Assignment projection mapping a user to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Stable user identifier.
    pub user_id: String,
    /// Email join key of the user.
    pub email: EmailAddress,
    /// Role identifier.
    pub role_id: String,
    /// Role name.
    pub role_name: String,
}

/// Result of the authoritative per-user permission lookup.
///
/// Distinguishes a user the store knows (possibly with zero grants, which is
/// a deliberate lockout) from a user the store has never seen. Transport
/// failures are reported as `AppError::Unavailable`, never as either variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionLookup {
    /// The user exists in the store; the grants may legitimately be empty.
    Configured(Vec<Permission>),
    /// The store has no record of the user.
    NotConfigured,
}

/// Repository port for the role, assignment, and user graph.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Lists the permission catalog.
    async fn list_catalog(&self) -> AppResult<Vec<PermissionDescriptor>>;

    /// Lists all roles with effective grants.
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>>;

    /// Finds one role by identifier.
    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>>;

    /// Creates a role with an empty permission set.
    ///
    /// Fails with `Conflict` when the case-sensitive name already exists.
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition>;

    /// Deletes a role and every assignment referencing it.
    ///
    /// The cascade over assignments is mandatory; users are never deleted.
    async fn delete_role(&self, role_id: &str) -> AppResult<()>;

    /// Links one permission to a role.
    async fn add_role_permission(&self, role_id: &str, permission: Permission) -> AppResult<()>;

    /// Unlinks one permission from a role.
    async fn remove_role_permission(
        &self,
        role_id: &str,
        permission: Permission,
    ) -> AppResult<()>;

    /// Finds a user by the email join key (case-sensitive).
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<DirectoryUser>>;

    /// Creates a directory user.
    async fn create_user(&self, input: NewDirectoryUser) -> AppResult<DirectoryUser>;

    /// Links a user to a role; the store deduplicates repeated pairs.
    async fn assign_role(&self, user_id: &str, role_id: &str) -> AppResult<()>;

    /// Removes a user-to-role link.
    async fn unassign_role(&self, user_id: &str, role_id: &str) -> AppResult<()>;

    /// Lists all current assignments.
    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>>;

    /// Authoritative lookup: the union of the user's role grants.
    async fn lookup_permissions_by_email(
        &self,
        email: &EmailAddress,
    ) -> AppResult<PermissionLookup>;
}

/// A cached resolution entry: advisory only, never the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResolution {
    /// The last confirmed permission set.
    pub permissions: ResolvedPermissionSet,
    /// When the authoritative lookup confirmed it.
    pub fetched_at: DateTime<Utc>,
}

/// Cache port for last-known-good resolutions, keyed by email.
///
/// Every administrative mutation that can change a user's effective
/// permissions must invalidate through this port.
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    /// Returns the cached resolution for an email, if any.
    async fn get(&self, email: &str) -> Option<CachedResolution>;

    /// Stores a confirmed resolution.
    async fn put(&self, email: &str, resolution: CachedResolution);

    /// Drops one user's cached resolution.
    async fn invalidate(&self, email: &str);

    /// Drops every cached resolution.
    async fn invalidate_all(&self);
}
