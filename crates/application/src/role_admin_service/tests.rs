use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use drivelane_core::{AccountType, AppError, AppResult, UserIdentity};
use drivelane_domain::{EmailAddress, Permission};
use tokio::sync::RwLock;

use crate::audit::{AuditEvent, AuditRepository};
use crate::directory_ports::{
    CachedResolution, CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser,
    PermissionDescriptor, PermissionLookup, ResolutionCache, RoleAssignment, RoleDefinition,
};
use crate::permission_resolver::PermissionResolver;

use super::RoleAdminService;

/// Full in-memory directory graph: roles, grants, users, assignments.
#[derive(Default)]
struct FakeDirectory {
    roles: RwLock<Vec<RoleDefinition>>,
    users: RwLock<Vec<DirectoryUser>>,
    assignments: RwLock<Vec<(String, String)>>,
    next_id: AtomicUsize,
    fail_add_permission: Option<Permission>,
    conflict_on_create_user: bool,
    race_user: RwLock<Option<DirectoryUser>>,
}

impl FakeDirectory {
    fn next_id(&self) -> String {
        format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn seed_role(&self, name: &str, permissions: Vec<Permission>) -> String {
        let role_id = self.next_id();
        self.roles.write().await.push(RoleDefinition {
            role_id: role_id.clone(),
            name: name.to_owned(),
            description: None,
            permissions,
        });
        role_id
    }

    async fn seed_user(&self, email: &str) -> String {
        let user_id = self.next_id();
        let email = EmailAddress::new(email).unwrap_or_else(|_| unreachable!());
        self.users.write().await.push(DirectoryUser {
            user_id: user_id.clone(),
            email: email.clone(),
            username: email.local_part().to_owned(),
            account_type: None,
        });
        user_id
    }
}

#[async_trait]
impl DirectoryRepository for FakeDirectory {
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
        Ok(self.roles.read().await.clone())
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|role| role.role_id == role_id)
            .cloned())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.write().await;
        if roles.iter().any(|role| role.name == input.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let role = RoleDefinition {
            role_id: self.next_id(),
            name: input.name,
            description: input.description,
            permissions: Vec::new(),
        };
        roles.push(role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: &str) -> AppResult<()> {
        self.roles.write().await.retain(|role| role.role_id != role_id);
        self.assignments
            .write()
            .await
            .retain(|(_, assigned_role)| assigned_role != role_id);
        Ok(())
    }

    async fn add_role_permission(&self, role_id: &str, permission: Permission) -> AppResult<()> {
        if self.fail_add_permission == Some(permission) {
            return Err(AppError::Unavailable("link call failed".to_owned()));
        }

        let mut roles = self.roles.write().await;
        if let Some(role) = roles.iter_mut().find(|role| role.role_id == role_id)
            && !role.permissions.contains(&permission)
        {
            role.permissions.push(permission);
        }
        Ok(())
    }

    async fn remove_role_permission(
        &self,
        role_id: &str,
        permission: Permission,
    ) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if let Some(role) = roles.iter_mut().find(|role| role.role_id == role_id) {
            role.permissions.retain(|granted| *granted != permission);
        }
        Ok(())
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<DirectoryUser>> {
        if let Some(raced) = self.race_user.read().await.clone()
            && raced.email == *email
        {
            return Ok(Some(raced));
        }

        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.email == *email)
            .cloned())
    }

    async fn create_user(&self, input: NewDirectoryUser) -> AppResult<DirectoryUser> {
        if self.conflict_on_create_user {
            // Simulate losing the provisioning race: the user appears once
            // the caller re-reads.
            let raced = DirectoryUser {
                user_id: "raced-user".to_owned(),
                email: input.email,
                username: input.username,
                account_type: None,
            };
            *self.race_user.write().await = Some(raced);
            return Err(AppError::Conflict("username already taken".to_owned()));
        }

        let user = DirectoryUser {
            user_id: self.next_id(),
            email: input.email,
            username: input.username,
            account_type: None,
        };
        self.users.write().await.push(user.clone());
        Ok(user)
    }

    async fn assign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        let mut assignments = self.assignments.write().await;
        let pair = (user_id.to_owned(), role_id.to_owned());
        if !assignments.contains(&pair) {
            assignments.push(pair);
        }
        Ok(())
    }

    async fn unassign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        self.assignments
            .write()
            .await
            .retain(|(assigned_user, assigned_role)| {
                !(assigned_user == user_id && assigned_role == role_id)
            });
        Ok(())
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let assignments = self.assignments.read().await.clone();
        let roles = self.roles.read().await.clone();
        let users = self.users.read().await.clone();

        Ok(assignments
            .into_iter()
            .filter_map(|(user_id, role_id)| {
                let user = users.iter().find(|user| user.user_id == user_id)?;
                let role = roles.iter().find(|role| role.role_id == role_id)?;
                Some(RoleAssignment {
                    user_id,
                    email: user.email.clone(),
                    role_id: role.role_id.clone(),
                    role_name: role.name.clone(),
                })
            })
            .collect())
    }

    async fn lookup_permissions_by_email(
        &self,
        email: &EmailAddress,
    ) -> AppResult<PermissionLookup> {
        let Some(user) = self.find_user_by_email(email).await? else {
            return Ok(PermissionLookup::NotConfigured);
        };

        let assignments = self.assignments.read().await;
        let roles = self.roles.read().await;
        let mut grants = Vec::new();
        for (user_id, role_id) in assignments.iter() {
            if user_id == &user.user_id
                && let Some(role) = roles.iter().find(|role| &role.role_id == role_id)
            {
                grants.extend(role.permissions.iter().copied());
            }
        }

        Ok(PermissionLookup::Configured(grants))
    }
}

#[derive(Default)]
struct FakeCache {
    entries: RwLock<HashMap<String, CachedResolution>>,
    invalidations: AtomicUsize,
}

#[async_trait]
impl ResolutionCache for FakeCache {
    async fn get(&self, email: &str) -> Option<CachedResolution> {
        self.entries.read().await.get(email).cloned()
    }

    async fn put(&self, email: &str, resolution: CachedResolution) {
        self.entries
            .write()
            .await
            .insert(email.to_owned(), resolution);
    }

    async fn invalidate(&self, email: &str) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.entries.write().await.remove(email);
    }

    async fn invalidate_all(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.entries.write().await.clear();
    }
}

#[derive(Default)]
struct FakeAuditRepository {
    events: RwLock<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

fn admin() -> UserIdentity {
    // Unconfigured general managers keep the full default set, so this
    // actor passes every administrative permission check.
    UserIdentity::new("gm@dealer.in", "GM", AccountType::GeneralManager, None)
}

fn advisor() -> UserIdentity {
    UserIdentity::new("sa@dealer.in", "SA", AccountType::ServiceAdvisor, None)
}

struct Harness {
    service: RoleAdminService,
    resolver: PermissionResolver,
    directory: Arc<FakeDirectory>,
    cache: Arc<FakeCache>,
    audit: Arc<FakeAuditRepository>,
}

fn harness(directory: FakeDirectory) -> Harness {
    let directory = Arc::new(directory);
    let cache = Arc::new(FakeCache::default());
    let audit = Arc::new(FakeAuditRepository::default());
    let resolver = PermissionResolver::new(directory.clone(), cache.clone());
    let service = RoleAdminService::new(
        resolver.clone(),
        directory.clone(),
        cache.clone(),
        audit.clone(),
    );

    Harness {
        service,
        resolver,
        directory,
        cache,
        audit,
    }
}

#[tokio::test]
async fn create_role_requires_manage_permission() {
    let harness = harness(FakeDirectory::default());

    let result = harness
        .service
        .create_role(
            &advisor(),
            CreateRoleInput {
                name: "Service Manager".to_owned(),
                description: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn create_role_starts_empty_and_writes_audit() {
    let harness = harness(FakeDirectory::default());

    let role = harness
        .service
        .create_role(
            &admin(),
            CreateRoleInput {
                name: "Service Manager".to_owned(),
                description: Some("workshop leads".to_owned()),
            },
        )
        .await;

    assert!(role.is_ok());
    if let Ok(role) = role {
        assert!(role.permissions.is_empty());
    }
    assert_eq!(harness.audit.events.read().await.len(), 1);
}

#[tokio::test]
async fn blank_role_names_are_rejected() {
    let harness = harness(FakeDirectory::default());

    let result = harness
        .service
        .create_role(
            &admin(),
            CreateRoleInput {
                name: "   ".to_owned(),
                description: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(harness.audit.events.read().await.is_empty());
}

#[tokio::test]
async fn duplicate_role_name_is_a_conflict() {
    let directory = FakeDirectory::default();
    directory.seed_role("Service Manager", Vec::new()).await;
    let harness = harness(directory);

    let result = harness
        .service
        .create_role(
            &admin(),
            CreateRoleInput {
                name: "Service Manager".to_owned(),
                description: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn permission_sync_is_a_residue_free_replace() {
    let directory = FakeDirectory::default();
    let role_id = directory
        .seed_role(
            "ops",
            vec![Permission::Upload, Permission::Overview],
        )
        .await;
    let harness = harness(directory);

    let report = harness
        .service
        .set_role_permissions(
            &admin(),
            &role_id,
            vec![Permission::Overview, Permission::ManageUsers],
        )
        .await;

    assert!(report.is_ok());
    if let Ok(report) = report {
        assert_eq!(report.added, vec![Permission::ManageUsers]);
        assert_eq!(report.removed, vec![Permission::Upload]);
        assert!(report.is_fully_applied());
    }

    let role = harness.directory.find_role(&role_id).await;
    let mut stored = role
        .ok()
        .flatten()
        .map(|role| role.permissions)
        .unwrap_or_default();
    stored.sort();
    assert_eq!(stored, vec![Permission::Overview, Permission::ManageUsers]);
}

#[tokio::test]
async fn partial_sync_failures_are_reported_not_hidden() {
    let directory = FakeDirectory {
        fail_add_permission: Some(Permission::MisReport),
        ..FakeDirectory::default()
    };
    let role_id = directory.seed_role("ops", Vec::new()).await;
    let harness = harness(directory);

    let report = harness
        .service
        .set_role_permissions(
            &admin(),
            &role_id,
            vec![Permission::Upload, Permission::MisReport],
        )
        .await;

    assert!(report.is_ok());
    if let Ok(report) = report {
        assert_eq!(report.added, vec![Permission::Upload]);
        assert_eq!(report.failed_to_add, vec![Permission::MisReport]);
        assert!(!report.is_fully_applied());
    }
}

#[tokio::test]
async fn deleting_a_role_cascades_and_locks_out_its_only_holders() {
    let directory = FakeDirectory::default();
    let role_id = directory
        .seed_role("ops", vec![Permission::Upload])
        .await;
    let user_id = directory.seed_user("sm@dealer.in").await;
    let _ = directory.assign_role(&user_id, &role_id).await;
    let harness = harness(directory);

    let sm = UserIdentity::new("sm@dealer.in", "SM", AccountType::ServiceManager, None);
    let before = harness.resolver.resolve(&sm).await;
    assert!(before.permissions.has_permission(Permission::Upload));

    let deleted = harness.service.delete_role(&admin(), &role_id).await;
    assert!(deleted.is_ok());

    // The user still exists but is now configured with zero roles: an
    // explicit lockout, not a fall back to account defaults.
    let after = harness.resolver.resolve(&sm).await;
    assert!(after.permissions.is_empty());
    assert!(
        harness
            .directory
            .list_role_assignments()
            .await
            .map(|assignments| assignments.is_empty())
            .unwrap_or(false)
    );
}

#[tokio::test]
async fn assigning_twice_keeps_a_single_pair() {
    let directory = FakeDirectory::default();
    let role_id = directory.seed_role("ops", Vec::new()).await;
    directory.seed_user("sm@dealer.in").await;
    let harness = harness(directory);

    for _ in 0..2 {
        let result = harness
            .service
            .assign_role_to_user(&admin(), "sm@dealer.in", &role_id)
            .await;
        assert!(result.is_ok());
    }

    assert_eq!(
        harness
            .directory
            .list_role_assignments()
            .await
            .ok()
            .map(|assignments| assignments.len()),
        Some(1)
    );
}

#[tokio::test]
async fn assignment_provisions_missing_users_first() {
    let directory = FakeDirectory::default();
    let role_id = directory.seed_role("ops", Vec::new()).await;
    let harness = harness(directory);

    let result = harness
        .service
        .assign_role_to_user(&admin(), "new.advisor@dealer.in", &role_id)
        .await;
    assert!(result.is_ok());

    let user = harness
        .directory
        .find_user_by_email(
            &EmailAddress::new("new.advisor@dealer.in").unwrap_or_else(|_| unreachable!()),
        )
        .await;
    assert!(matches!(user, Ok(Some(_))));
    if let Ok(Some(user)) = user {
        // Synthetic usernames carry a timestamp suffix to dodge collisions.
        assert!(user.username.starts_with("new.advisor_"));
    }

    let actions: Vec<_> = harness
        .audit
        .events
        .read()
        .await
        .iter()
        .map(|event| event.action)
        .collect();
    assert!(actions.contains(&drivelane_domain::AuditAction::UserProvisioned));
    assert!(actions.contains(&drivelane_domain::AuditAction::RoleAssigned));
}

#[tokio::test]
async fn lost_provisioning_race_is_absorbed() {
    let directory = FakeDirectory {
        conflict_on_create_user: true,
        ..FakeDirectory::default()
    };
    let role_id = directory.seed_role("ops", Vec::new()).await;
    let harness = harness(directory);

    let result = harness
        .service
        .assign_role_to_user(&admin(), "raced@dealer.in", &role_id)
        .await;

    assert!(result.is_ok());
    let assignments = harness.directory.list_role_assignments().await;
    assert!(
        assignments
            .map(|assignments| assignments
                .iter()
                .any(|assignment| assignment.user_id == "raced-user"))
            .unwrap_or(false)
    );
}

#[tokio::test]
async fn mutations_invalidate_the_resolution_cache() {
    let directory = FakeDirectory::default();
    let role_id = directory.seed_role("ops", vec![Permission::Upload]).await;
    directory.seed_user("sm@dealer.in").await;
    let harness = harness(directory);

    let before = harness.cache.invalidations.load(Ordering::SeqCst);

    let assigned = harness
        .service
        .assign_role_to_user(&admin(), "sm@dealer.in", &role_id)
        .await;
    assert!(assigned.is_ok());

    let synced = harness
        .service
        .set_role_permissions(&admin(), &role_id, vec![Permission::Overview])
        .await;
    assert!(synced.is_ok());

    let deleted = harness.service.delete_role(&admin(), &role_id).await;
    assert!(deleted.is_ok());

    assert_eq!(
        harness.cache.invalidations.load(Ordering::SeqCst),
        before + 3
    );
}

#[tokio::test]
async fn unassign_requires_an_existing_user() {
    let directory = FakeDirectory::default();
    let role_id = directory.seed_role("ops", Vec::new()).await;
    let harness = harness(directory);

    let result = harness
        .service
        .unassign_role_from_user(&admin(), "ghost@dealer.in", &role_id)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}
