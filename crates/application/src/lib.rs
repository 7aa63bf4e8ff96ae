//! Application services and ports.

#![forbid(unsafe_code)]

mod audit;
mod directory_ports;
mod permission_resolver;
mod role_admin_service;
mod target_ports;
mod target_service;

pub use audit::{AuditEvent, AuditRepository};
pub use directory_ports::{
    CachedResolution, CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser,
    PermissionDescriptor, PermissionLookup, ResolutionCache, RoleAssignment, RoleDefinition,
};
pub use permission_resolver::{PermissionResolver, Resolution, ResolutionSource};
pub use role_admin_service::{PermissionSyncReport, RoleAdminService};
pub use target_ports::{
    AdvisorTarget, CityTarget, ServiceRecordRepository, TargetRepository,
};
pub use target_service::{AdvisorAchievement, CityAchievement, ManualAssignment, TargetService};
