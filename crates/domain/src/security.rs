use std::collections::BTreeSet;
use std::str::FromStr;

use drivelane_core::{AccountType, AppError};
use serde::{Deserialize, Serialize};

/// Capability keys understood by the dashboard.
///
/// The catalog is the fixed universe of gated capabilities; keys are flat and
/// independent, with no prefix or hierarchy semantics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Landing overview page.
    Overview,
    /// Spreadsheet export upload.
    Upload,
    /// Repair-order billing dashboard.
    RoBillingDashboard,
    /// Monthly MIS report.
    MisReport,
    /// City and advisor target distribution.
    TargetDistribution,
    /// Per-advisor performance view.
    AdvisorPerformance,
    /// Cross-city comparison view.
    CityComparison,
    /// Warranty claims dashboard.
    WarrantyDashboard,
    /// Role and permission administration.
    ManageRoles,
    /// User-to-role assignment administration.
    ManageUsers,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Upload => "upload",
            Self::RoBillingDashboard => "ro_billing_dashboard",
            Self::MisReport => "mis_report",
            Self::TargetDistribution => "target_distribution",
            Self::AdvisorPerformance => "advisor_performance",
            Self::CityComparison => "city_comparison",
            Self::WarrantyDashboard => "warranty_dashboard",
            Self::ManageRoles => "manage_roles",
            Self::ManageUsers => "manage_users",
        }
    }

    /// Returns a human-readable display name for administrative views.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Upload => "Upload",
            Self::RoBillingDashboard => "RO Billing Dashboard",
            Self::MisReport => "MIS Report",
            Self::TargetDistribution => "Target Distribution",
            Self::AdvisorPerformance => "Advisor Performance",
            Self::CityComparison => "City Comparison",
            Self::WarrantyDashboard => "Warranty Dashboard",
            Self::ManageRoles => "Manage Roles",
            Self::ManageUsers => "Manage Users",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::Overview,
            Permission::Upload,
            Permission::RoBillingDashboard,
            Permission::MisReport,
            Permission::TargetDistribution,
            Permission::AdvisorPerformance,
            Permission::CityComparison,
            Permission::WarrantyDashboard,
            Permission::ManageRoles,
            Permission::ManageUsers,
        ];

        ALL
    }

    /// Parses a transport value into a permission.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "overview" => Ok(Self::Overview),
            "upload" => Ok(Self::Upload),
            "ro_billing_dashboard" => Ok(Self::RoBillingDashboard),
            "mis_report" => Ok(Self::MisReport),
            "target_distribution" => Ok(Self::TargetDistribution),
            "advisor_performance" => Ok(Self::AdvisorPerformance),
            "city_comparison" => Ok(Self::CityComparison),
            "warranty_dashboard" => Ok(Self::WarrantyDashboard),
            "manage_roles" => Ok(Self::ManageRoles),
            "manage_users" => Ok(Self::ManageUsers),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Returns the hard-coded fallback permission set for an account type.
///
/// Pure and total; the output is a subset of the catalog by construction.
/// This is a safety-net default for accounts the directory has never seen,
/// never an override for persisted configuration.
#[must_use]
pub fn default_permissions(account_type: AccountType) -> &'static [Permission] {
    const SERVICE_MANAGER: &[Permission] = &[
        Permission::Overview,
        Permission::Upload,
        Permission::RoBillingDashboard,
        Permission::MisReport,
        Permission::TargetDistribution,
        Permission::AdvisorPerformance,
    ];
    const SERVICE_ADVISOR: &[Permission] =
        &[Permission::Overview, Permission::AdvisorPerformance];

    match account_type {
        AccountType::GeneralManager => Permission::all(),
        AccountType::ServiceManager => SERVICE_MANAGER,
        AccountType::ServiceAdvisor => SERVICE_ADVISOR,
    }
}

/// The per-user capability set every protected page and API call is gated on.
///
/// Derived, never persisted; the directory remains the source of truth and
/// callers must re-resolve after administrative changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermissionSet(BTreeSet<Permission>);

impl ResolvedPermissionSet {
    /// Creates an empty set (the explicit lockout state).
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns true when the set grants exactly this key.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Returns true when the set grants any of the keys.
    #[must_use]
    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .any(|permission| self.0.contains(permission))
    }

    /// Returns true when the set grants nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of granted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates granted keys in stable order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for ResolvedPermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stable audit actions emitted by administrative use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a custom role is created.
    RoleCreated,
    /// Emitted when a role's permission set is replaced.
    RolePermissionsReplaced,
    /// Emitted when a role is deleted with its assignments.
    RoleDeleted,
    /// Emitted when a role is assigned to a user.
    RoleAssigned,
    /// Emitted when a role is removed from a user.
    RoleUnassigned,
    /// Emitted when a directory user is provisioned on first assignment.
    UserProvisioned,
    /// Emitted when a city target is saved.
    CityTargetSaved,
    /// Emitted when a city target is distributed to advisors.
    TargetDistributed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "security.role.created",
            Self::RolePermissionsReplaced => "security.role.permissions_replaced",
            Self::RoleDeleted => "security.role.deleted",
            Self::RoleAssigned => "security.role.assigned",
            Self::RoleUnassigned => "security.role.unassigned",
            Self::UserProvisioned => "security.user.provisioned",
            Self::CityTargetSaved => "targets.city.saved",
            Self::TargetDistributed => "targets.distributed",
        }
    }
}
