use std::sync::Arc;

use chrono::Utc;
use drivelane_core::{AppError, AppResult, UserIdentity};
use drivelane_domain::{EmailAddress, Permission, ResolvedPermissionSet, default_permissions};
use tracing::warn;

use crate::directory_ports::{
    CachedResolution, DirectoryRepository, PermissionLookup, ResolutionCache,
};

/// Where a resolved permission set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Hard-coded account-type default (unconfigured admin, or degraded
    /// startup before any confirmed lookup).
    AccountDefault,
    /// Authoritative directory lookup.
    Directory,
    /// The user is configured in the directory with zero roles: a
    /// deliberate lockout that overrides the account-type default.
    ExplicitlyEmpty,
    /// The directory has never seen this non-admin user.
    UnconfiguredDenied,
    /// Transport failure; the last confirmed set was kept.
    LastKnownGood,
}

/// Outcome of a permission resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The authoritative capability set for this request.
    pub permissions: ResolvedPermissionSet,
    /// Provenance, so the UI can tell lockout apart from degradation.
    pub source: ResolutionSource,
}

/// Resolves the authoritative per-user permission set.
///
/// Combines the pure account-type defaults with the directory's
/// role-assignment graph under a strict precedence order, and fails soft:
/// `resolve` never surfaces an error to navigation, it degrades to the best
/// available set instead.
#[derive(Clone)]
pub struct PermissionResolver {
    directory: Arc<dyn DirectoryRepository>,
    cache: Arc<dyn ResolutionCache>,
}

impl PermissionResolver {
    /// Creates a resolver from the directory and cache ports.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryRepository>, cache: Arc<dyn ResolutionCache>) -> Self {
        Self { directory, cache }
    }

    /// Resolves the capability set for one user.
    ///
    /// Precedence, strictly in order:
    /// 1. the account-type default is the provisional set;
    /// 2. a non-empty authoritative union replaces it;
    /// 3. a configured user with zero roles resolves to the empty set;
    /// 4. an unconfigured general manager keeps the default, any other
    ///    unconfigured account resolves to the empty set;
    /// 5. on transport failure the last confirmed set (or the provisional
    ///    default) is kept rather than resetting to empty.
    pub async fn resolve(&self, user: &UserIdentity) -> Resolution {
        let provisional: ResolvedPermissionSet =
            default_permissions(user.account_type()).iter().copied().collect();

        let email = match EmailAddress::new(user.email()) {
            Ok(email) => email,
            Err(error) => {
                warn!(email = user.email(), %error, "identity email failed validation");
                return self.unconfigured_resolution(user, provisional);
            }
        };

        match self.directory.lookup_permissions_by_email(&email).await {
            Ok(PermissionLookup::Configured(grants)) if !grants.is_empty() => {
                let permissions: ResolvedPermissionSet = grants.into_iter().collect();
                self.remember(email.as_str(), &permissions).await;
                Resolution {
                    permissions,
                    source: ResolutionSource::Directory,
                }
            }
            Ok(PermissionLookup::Configured(_)) => {
                let permissions = ResolvedPermissionSet::empty();
                self.remember(email.as_str(), &permissions).await;
                Resolution {
                    permissions,
                    source: ResolutionSource::ExplicitlyEmpty,
                }
            }
            Ok(PermissionLookup::NotConfigured) => {
                let resolution = self.unconfigured_resolution(user, provisional);
                self.remember(email.as_str(), &resolution.permissions).await;
                resolution
            }
            Err(error) => {
                warn!(
                    email = email.as_str(),
                    %error,
                    "authoritative permission lookup failed; keeping last known-good set"
                );

                match self.cache.get(email.as_str()).await {
                    Some(cached) => Resolution {
                        permissions: cached.permissions,
                        source: ResolutionSource::LastKnownGood,
                    },
                    None => Resolution {
                        permissions: provisional,
                        source: ResolutionSource::AccountDefault,
                    },
                }
            }
        }
    }

    /// Resolves and requires one capability, for administrative use-cases.
    pub async fn require_permission(
        &self,
        user: &UserIdentity,
        permission: Permission,
    ) -> AppResult<()> {
        let resolution = self.resolve(user).await;
        if resolution.permissions.has_permission(permission) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{}' is missing permission '{}'",
            user.email(),
            permission.as_str()
        )))
    }

    fn unconfigured_resolution(
        &self,
        user: &UserIdentity,
        provisional: ResolvedPermissionSet,
    ) -> Resolution {
        if user.account_type().is_general_manager() {
            // Bootstrap convenience: admins keep defaults before the
            // permission system is seeded.
            Resolution {
                permissions: provisional,
                source: ResolutionSource::AccountDefault,
            }
        } else {
            Resolution {
                permissions: ResolvedPermissionSet::empty(),
                source: ResolutionSource::UnconfiguredDenied,
            }
        }
    }

    async fn remember(&self, email: &str, permissions: &ResolvedPermissionSet) {
        self.cache
            .put(
                email,
                CachedResolution {
                    permissions: permissions.clone(),
                    fetched_at: Utc::now(),
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use drivelane_core::{AccountType, AppError, AppResult, UserIdentity};
    use drivelane_domain::{
        EmailAddress, Permission, ResolvedPermissionSet, default_permissions,
    };
    use tokio::sync::RwLock;

    use crate::directory_ports::{
        CachedResolution, CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser,
        PermissionDescriptor, PermissionLookup, ResolutionCache, RoleAssignment, RoleDefinition,
    };

    use super::{PermissionResolver, ResolutionSource};

    /// Directory fake that only answers the authoritative lookup.
    struct FakeDirectory {
        lookups: HashMap<String, PermissionLookup>,
        unavailable: bool,
    }

    impl FakeDirectory {
        fn configured(email: &str, grants: Vec<Permission>) -> Self {
            Self {
                lookups: HashMap::from([(
                    email.to_owned(),
                    PermissionLookup::Configured(grants),
                )]),
                unavailable: false,
            }
        }

        fn empty() -> Self {
            Self {
                lookups: HashMap::new(),
                unavailable: false,
            }
        }

        fn down() -> Self {
            Self {
                lookups: HashMap::new(),
                unavailable: true,
            }
        }
    }

    #[async_trait]
    impl DirectoryRepository for FakeDirectory {
        async fn list_catalog(&self) -> AppResult<Vec<PermissionDescriptor>> {
            Ok(Vec::new())
        }

        async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
            Ok(Vec::new())
        }

        async fn find_role(&self, _role_id: &str) -> AppResult<Option<RoleDefinition>> {
            Ok(None)
        }

        async fn create_role(&self, _input: CreateRoleInput) -> AppResult<RoleDefinition> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn delete_role(&self, _role_id: &str) -> AppResult<()> {
            Ok(())
        }

        async fn add_role_permission(
            &self,
            _role_id: &str,
            _permission: Permission,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn remove_role_permission(
            &self,
            _role_id: &str,
            _permission: Permission,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn find_user_by_email(
            &self,
            _email: &EmailAddress,
        ) -> AppResult<Option<DirectoryUser>> {
            Ok(None)
        }

        async fn create_user(&self, _input: NewDirectoryUser) -> AppResult<DirectoryUser> {
            Err(AppError::Internal("not used".to_owned()))
        }

        async fn assign_role(&self, _user_id: &str, _role_id: &str) -> AppResult<()> {
            Ok(())
        }

        async fn unassign_role(&self, _user_id: &str, _role_id: &str) -> AppResult<()> {
            Ok(())
        }

        async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
            Ok(Vec::new())
        }

        async fn lookup_permissions_by_email(
            &self,
            email: &EmailAddress,
        ) -> AppResult<PermissionLookup> {
            if self.unavailable {
                return Err(AppError::Unavailable("directory unreachable".to_owned()));
            }

            Ok(self
                .lookups
                .get(email.as_str())
                .cloned()
                .unwrap_or(PermissionLookup::NotConfigured))
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: RwLock<HashMap<String, CachedResolution>>,
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
            self.entries.write().await.remove(email);
        }

        async fn invalidate_all(&self) {
            self.entries.write().await.clear();
        }
    }

    fn user(email: &str, account_type: AccountType) -> UserIdentity {
        UserIdentity::new(email, "Test User", account_type, None)
    }

    fn resolver(directory: FakeDirectory) -> PermissionResolver {
        PermissionResolver::new(Arc::new(directory), Arc::new(FakeCache::default()))
    }

    #[tokio::test]
    async fn configured_user_gets_the_union_of_role_grants() {
        let resolver = resolver(FakeDirectory::configured(
            "x@y.com",
            vec![Permission::Upload, Permission::RoBillingDashboard],
        ));

        // Account type does not matter once the directory answers.
        let resolution = resolver.resolve(&user("x@y.com", AccountType::ServiceAdvisor)).await;

        assert_eq!(resolution.source, ResolutionSource::Directory);
        assert!(resolution.permissions.has_permission(Permission::Upload));
        assert!(resolution
            .permissions
            .has_permission(Permission::RoBillingDashboard));
        assert!(!resolution.permissions.has_permission(Permission::ManageUsers));
    }

    #[tokio::test]
    async fn configured_user_with_zero_roles_is_locked_out() {
        let resolver = resolver(FakeDirectory::configured("locked@dealer.in", Vec::new()));

        // The GM default is non-empty, but explicit emptiness wins.
        let resolution = resolver
            .resolve(&user("locked@dealer.in", AccountType::GeneralManager))
            .await;

        assert_eq!(resolution.source, ResolutionSource::ExplicitlyEmpty);
        assert!(resolution.permissions.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_general_manager_keeps_defaults() {
        let resolver = resolver(FakeDirectory::empty());

        let resolution = resolver
            .resolve(&user("gm@dealer.in", AccountType::GeneralManager))
            .await;

        assert_eq!(resolution.source, ResolutionSource::AccountDefault);
        let expected: ResolvedPermissionSet =
            default_permissions(AccountType::GeneralManager).iter().copied().collect();
        assert_eq!(resolution.permissions, expected);
    }

    #[tokio::test]
    async fn unconfigured_non_admins_are_denied() {
        let resolver = resolver(FakeDirectory::empty());

        for account_type in [AccountType::ServiceManager, AccountType::ServiceAdvisor] {
            let resolution = resolver.resolve(&user("new@dealer.in", account_type)).await;
            assert_eq!(resolution.source, ResolutionSource::UnconfiguredDenied);
            assert!(resolution.permissions.is_empty());
        }
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_last_known_good_set() {
        let cache = Arc::new(FakeCache::default());
        cache
            .put(
                "sm@dealer.in",
                CachedResolution {
                    permissions: [Permission::Upload].into_iter().collect(),
                    fetched_at: Utc::now(),
                },
            )
            .await;

        let resolver = PermissionResolver::new(Arc::new(FakeDirectory::down()), cache);
        let resolution = resolver
            .resolve(&user("sm@dealer.in", AccountType::ServiceManager))
            .await;

        assert_eq!(resolution.source, ResolutionSource::LastKnownGood);
        assert!(resolution.permissions.has_permission(Permission::Upload));
    }

    #[tokio::test]
    async fn transport_failure_without_history_keeps_the_provisional_default() {
        let resolver = resolver(FakeDirectory::down());

        let resolution = resolver
            .resolve(&user("sm@dealer.in", AccountType::ServiceManager))
            .await;

        // The stricter unconfigured rules apply only to confirmed lookups.
        assert_eq!(resolution.source, ResolutionSource::AccountDefault);
        assert!(resolution.permissions.has_permission(Permission::Upload));
    }

    #[tokio::test]
    async fn confirmed_lockout_survives_a_later_outage() {
        let cache = Arc::new(FakeCache::default());
        let online = PermissionResolver::new(
            Arc::new(FakeDirectory::configured("locked@dealer.in", Vec::new())),
            cache.clone(),
        );
        let locked = online
            .resolve(&user("locked@dealer.in", AccountType::ServiceManager))
            .await;
        assert!(locked.permissions.is_empty());

        let offline = PermissionResolver::new(Arc::new(FakeDirectory::down()), cache);
        let resolution = offline
            .resolve(&user("locked@dealer.in", AccountType::ServiceManager))
            .await;

        assert_eq!(resolution.source, ResolutionSource::LastKnownGood);
        assert!(resolution.permissions.is_empty());
    }

    #[tokio::test]
    async fn require_permission_maps_to_forbidden() {
        let resolver = resolver(FakeDirectory::configured(
            "x@y.com",
            vec![Permission::Upload],
        ));
        let identity = user("x@y.com", AccountType::ServiceManager);

        let allowed = resolver
            .require_permission(&identity, Permission::Upload)
            .await;
        assert!(allowed.is_ok());

        let denied = resolver
            .require_permission(&identity, Permission::ManageUsers)
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
    }
}
