//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod distribution;
mod security;
mod target;
mod user;

pub use distribution::ManualDistribution;
pub use security::{
    AuditAction, Permission, ResolvedPermissionSet, default_permissions,
};
pub use target::{
    AchievementSummary, MetricAchievement, MonthKey, ServiceCategory, ServiceRecord,
    TargetMetrics, divide_evenly, normalize_advisor_name, remaining_working_days,
};
pub use user::{EmailAddress, UserId, synthesize_username};
