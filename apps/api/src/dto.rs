use chrono::NaiveDate;
use drivelane_application::{
    AdvisorAchievement, AdvisorTarget, CityAchievement, CityTarget, PermissionDescriptor,
    PermissionSyncReport, Resolution, ResolutionSource, RoleAssignment, RoleDefinition,
};
use drivelane_domain::{AchievementSummary, Permission, TargetMetrics};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming payload for custom role creation.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Incoming payload for the diff-based permission replace.
#[derive(Debug, Deserialize)]
pub struct SetRolePermissionsRequest {
    pub permissions: Vec<String>,
}

/// Incoming payload for role assignment.
#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub email: String,
    pub role_id: String,
}

/// Incoming payload for role unassignment.
#[derive(Debug, Deserialize)]
pub struct RemoveRoleAssignmentRequest {
    pub email: String,
    pub role_id: String,
}

/// API representation of a catalog entry.
#[derive(Debug, Serialize)]
pub struct PermissionDescriptorResponse {
    pub key: String,
    pub name: String,
}

/// API representation of a role.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// API representation of a permission sync outcome.
#[derive(Debug, Serialize)]
pub struct PermissionSyncReportResponse {
    pub role_id: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failed_to_add: Vec<String>,
    pub failed_to_remove: Vec<String>,
    pub fully_applied: bool,
}

/// API representation of a role assignment.
#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub user_id: String,
    pub email: String,
    pub role_id: String,
    pub role_name: String,
}

/// API representation of the caller's resolved permission set.
#[derive(Debug, Serialize)]
pub struct ResolvedPermissionsResponse {
    pub permissions: Vec<String>,
    pub source: &'static str,
}

/// Incoming payload for saving a city target.
#[derive(Debug, Deserialize)]
pub struct SaveCityTargetRequest {
    pub city: String,
    pub month: String,
    pub metrics: TargetMetrics,
}

/// Query selecting a city and month.
#[derive(Debug, Deserialize)]
pub struct CityMonthQuery {
    pub city: String,
    pub month: String,
}

/// Incoming payload for the automatic even distribution.
#[derive(Debug, Deserialize)]
pub struct DistributeTargetRequest {
    pub city: String,
    pub month: String,
    pub advisors: Vec<String>,
}

/// One advisor-to-target pairing in a manual distribution payload.
#[derive(Debug, Deserialize)]
pub struct ManualAssignmentRequest {
    pub advisor: String,
    pub metrics: TargetMetrics,
}

/// Incoming payload for a manual distribution pass.
#[derive(Debug, Deserialize)]
pub struct ManualDistributionRequest {
    pub city: String,
    pub month: String,
    pub roster: Vec<String>,
    pub assignments: Vec<ManualAssignmentRequest>,
}

/// One already-parsed operational row in an ingestion payload.
#[derive(Debug, Deserialize)]
pub struct ServiceRecordRequest {
    pub advisor: String,
    pub city: String,
    pub work_type: String,
    pub labour_amount: f64,
    pub parts_amount: f64,
    pub closed_on: NaiveDate,
}

/// Incoming payload for service record ingestion.
#[derive(Debug, Deserialize)]
pub struct IngestServiceRecordsRequest {
    pub records: Vec<ServiceRecordRequest>,
}

/// Ingestion outcome.
#[derive(Debug, Serialize)]
pub struct IngestReportResponse {
    pub stored: usize,
}

/// API representation of a city target.
#[derive(Debug, Serialize)]
pub struct CityTargetResponse {
    pub city: String,
    pub month: String,
    pub metrics: TargetMetrics,
}

/// API representation of one advisor's distributed target.
#[derive(Debug, Serialize)]
pub struct AdvisorTargetResponse {
    pub city: String,
    pub month: String,
    pub advisor: String,
    pub metrics: TargetMetrics,
}

/// Query selecting an advisor's achievement view.
#[derive(Debug, Deserialize)]
pub struct AdvisorAchievementQuery {
    pub advisor: String,
    pub month: String,
    pub as_of: Option<NaiveDate>,
}

/// Query selecting a city's achievement view.
#[derive(Debug, Deserialize)]
pub struct CityAchievementQuery {
    pub city: String,
    pub month: String,
    pub as_of: Option<NaiveDate>,
}

/// API representation of one advisor's achievement snapshot.
#[derive(Debug, Serialize)]
pub struct AdvisorAchievementResponse {
    pub advisor: String,
    pub city: String,
    pub month: String,
    pub summary: AchievementSummary,
}

/// API representation of a city's achievement snapshot.
#[derive(Debug, Serialize)]
pub struct CityAchievementResponse {
    pub city: String,
    pub month: String,
    pub summary: AchievementSummary,
    pub advisors: Vec<AdvisorAchievementResponse>,
}

/// Renders a resolution source for the UI, which distinguishes a
/// deliberate lockout from degraded operation.
#[must_use]
pub fn source_label(source: ResolutionSource) -> &'static str {
    match source {
        ResolutionSource::AccountDefault => "account_default",
        ResolutionSource::Directory => "directory",
        ResolutionSource::ExplicitlyEmpty => "explicitly_empty",
        ResolutionSource::UnconfiguredDenied => "unconfigured_denied",
        ResolutionSource::LastKnownGood => "last_known_good",
    }
}

fn permission_keys(permissions: &[Permission]) -> Vec<String> {
    permissions
        .iter()
        .map(|permission| permission.as_str().to_owned())
        .collect()
}

impl From<PermissionDescriptor> for PermissionDescriptorResponse {
    fn from(value: PermissionDescriptor) -> Self {
        Self {
            key: value.key.as_str().to_owned(),
            name: value.name,
        }
    }
}

impl From<RoleDefinition> for RoleResponse {
    fn from(value: RoleDefinition) -> Self {
        Self {
            role_id: value.role_id,
            name: value.name,
            description: value.description,
            permissions: permission_keys(&value.permissions),
        }
    }
}

impl From<PermissionSyncReport> for PermissionSyncReportResponse {
    fn from(value: PermissionSyncReport) -> Self {
        let fully_applied = value.is_fully_applied();
        Self {
            role_id: value.role_id,
            added: permission_keys(&value.added),
            removed: permission_keys(&value.removed),
            failed_to_add: permission_keys(&value.failed_to_add),
            failed_to_remove: permission_keys(&value.failed_to_remove),
            fully_applied,
        }
    }
}

impl From<RoleAssignment> for RoleAssignmentResponse {
    fn from(value: RoleAssignment) -> Self {
        Self {
            user_id: value.user_id,
            email: String::from(value.email),
            role_id: value.role_id,
            role_name: value.role_name,
        }
    }
}

impl From<Resolution> for ResolvedPermissionsResponse {
    fn from(value: Resolution) -> Self {
        Self {
            permissions: value
                .permissions
                .iter()
                .map(|permission| permission.as_str().to_owned())
                .collect(),
            source: source_label(value.source),
        }
    }
}

impl From<CityTarget> for CityTargetResponse {
    fn from(value: CityTarget) -> Self {
        Self {
            city: value.city,
            month: value.month.to_string(),
            metrics: value.metrics,
        }
    }
}

impl From<AdvisorTarget> for AdvisorTargetResponse {
    fn from(value: AdvisorTarget) -> Self {
        Self {
            city: value.city,
            month: value.month.to_string(),
            advisor: value.advisor,
            metrics: value.metrics,
        }
    }
}

impl From<AdvisorAchievement> for AdvisorAchievementResponse {
    fn from(value: AdvisorAchievement) -> Self {
        Self {
            advisor: value.advisor,
            city: value.city,
            month: value.month.to_string(),
            summary: value.summary,
        }
    }
}

impl From<CityAchievement> for CityAchievementResponse {
    fn from(value: CityAchievement) -> Self {
        Self {
            city: value.city,
            month: value.month.to_string(),
            summary: value.summary,
            advisors: value
                .advisors
                .into_iter()
                .map(AdvisorAchievementResponse::from)
                .collect(),
        }
    }
}
