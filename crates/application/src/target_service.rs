use std::sync::Arc;

use chrono::NaiveDate;
use drivelane_core::{AppError, AppResult, UserIdentity};
use drivelane_domain::{
    AchievementSummary, AuditAction, ManualDistribution, MonthKey, Permission, ServiceRecord,
    TargetMetrics, divide_evenly, normalize_advisor_name, remaining_working_days,
};
use tracing::info;

use crate::audit::{AuditEvent, AuditRepository};
use crate::permission_resolver::PermissionResolver;
use crate::target_ports::{
    AdvisorTarget, CityTarget, ServiceRecordRepository, TargetRepository,
};


/// One advisor-to-target pairing in a manual distribution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualAssignment {
    /// Advisor name as entered; normalized before matching.
    pub advisor: String,
    /// The six tracked metrics for this advisor.
    pub metrics: TargetMetrics,
}

/// Achievement snapshot for one advisor.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorAchievement {
    /// Normalized advisor name.
    pub advisor: String,
    /// Normalized city name.
    pub city: String,
    /// Reported month.
    pub month: MonthKey,
    /// Per-metric target-versus-achieved figures.
    pub summary: AchievementSummary,
}

/// Achievement snapshot for one city, with the per-advisor breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct CityAchievement {
    /// Normalized city name.
    pub city: String,
    /// Reported month.
    pub month: MonthKey,
    /// City-level figures against the city target.
    pub summary: AchievementSummary,
    /// One entry per advisor holding a target in this city and month.
    pub advisors: Vec<AdvisorAchievement>,
}

/// Application service for targets, distribution, and achievement views.
#[derive(Clone)]
pub struct TargetService {
    resolver: PermissionResolver,
    targets: Arc<dyn TargetRepository>,
    records: Arc<dyn ServiceRecordRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl TargetService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        resolver: PermissionResolver,
        targets: Arc<dyn TargetRepository>,
        records: Arc<dyn ServiceRecordRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            resolver,
            targets,
            records,
            audit_repository,
        }
    }

    /// Saves or replaces a city's monthly target.
    pub async fn set_city_target(
        &self,
        actor: &UserIdentity,
        city: &str,
        month: MonthKey,
        metrics: TargetMetrics,
    ) -> AppResult<CityTarget> {
        self.resolver
            .require_permission(actor, Permission::TargetDistribution)
            .await?;

        let city = normalize_city(city)?;
        let target = CityTarget {
            city: city.clone(),
            month,
            metrics,
        };
        self.targets.save_city_target(target.clone()).await?;

        self.append_audit(
            actor,
            AuditAction::CityTargetSaved,
            format!("{city}:{month}"),
            Some(format!("saved target for city '{city}' in {month}")),
        )
        .await?;

        Ok(target)
    }

    /// Returns a city's monthly target.
    pub async fn city_target(
        &self,
        actor: &UserIdentity,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Option<CityTarget>> {
        self.resolver
            .require_permission(actor, Permission::TargetDistribution)
            .await?;

        let city = normalize_city(city)?;
        self.targets.find_city_target(&city, month).await
    }

    /// Splits the saved city target evenly across the advisor roster.
    ///
    /// Every metric is floor-divided; remainders stay undistributed. The
    /// result replaces any earlier distribution for this city and month.
    pub async fn distribute_automatic(
        &self,
        actor: &UserIdentity,
        city: &str,
        month: MonthKey,
        advisors: &[String],
    ) -> AppResult<Vec<AdvisorTarget>> {
        self.resolver
            .require_permission(actor, Permission::TargetDistribution)
            .await?;

        let city = normalize_city(city)?;
        let city_target = self
            .targets
            .find_city_target(&city, month)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("city '{city}' has no target for {month}"))
            })?;

        // The roster validation (non-empty, no duplicate spellings) is the
        // same as for a manual pass.
        let pass = ManualDistribution::new(advisors)?;
        let share = divide_evenly(city_target.metrics, pass.unassigned().len() as u64)?;

        let targets: Vec<AdvisorTarget> = pass
            .unassigned()
            .iter()
            .map(|advisor| AdvisorTarget {
                city: city.clone(),
                month,
                advisor: advisor.clone(),
                metrics: share,
            })
            .collect();

        self.targets
            .replace_advisor_targets(&city, month, targets.clone())
            .await?;

        info!(
            city,
            month = %month,
            advisors = targets.len(),
            "distributed city target evenly"
        );
        self.append_audit(
            actor,
            AuditAction::TargetDistributed,
            format!("{city}:{month}"),
            Some(format!(
                "distributed target of '{city}' evenly across {} advisors",
                targets.len()
            )),
        )
        .await?;

        Ok(targets)
    }

    /// Applies a manual distribution pass over the advisor roster.
    ///
    /// Every roster advisor must receive exactly one assignment; a partial
    /// pass is rejected before anything is stored. The result replaces any
    /// earlier distribution for this city and month.
    pub async fn distribute_manual(
        &self,
        actor: &UserIdentity,
        city: &str,
        month: MonthKey,
        roster: &[String],
        assignments: Vec<ManualAssignment>,
    ) -> AppResult<Vec<AdvisorTarget>> {
        self.resolver
            .require_permission(actor, Permission::TargetDistribution)
            .await?;

        let city = normalize_city(city)?;
        self.targets
            .find_city_target(&city, month)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("city '{city}' has no target for {month}"))
            })?;

        let mut pass = ManualDistribution::new(roster)?;
        for assignment in assignments {
            pass.assign(&assignment.advisor, assignment.metrics)?;
        }

        if !pass.is_complete() {
            return Err(AppError::Validation(format!(
                "advisors still unassigned: {}",
                pass.unassigned().join(", ")
            )));
        }

        let targets: Vec<AdvisorTarget> = pass
            .assignments()
            .iter()
            .map(|(advisor, metrics)| AdvisorTarget {
                city: city.clone(),
                month,
                advisor: advisor.clone(),
                metrics: *metrics,
            })
            .collect();

        self.targets
            .replace_advisor_targets(&city, month, targets.clone())
            .await?;

        info!(
            city,
            month = %month,
            advisors = targets.len(),
            "applied manual target distribution"
        );
        self.append_audit(
            actor,
            AuditAction::TargetDistributed,
            format!("{city}:{month}"),
            Some(format!(
                "manually distributed target of '{city}' across {} advisors",
                targets.len()
            )),
        )
        .await?;

        Ok(targets)
    }

    /// Lists the advisor targets produced by the latest distribution.
    pub async fn advisor_targets(
        &self,
        actor: &UserIdentity,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Vec<AdvisorTarget>> {
        self.resolver
            .require_permission(actor, Permission::TargetDistribution)
            .await?;

        let city = normalize_city(city)?;
        self.targets.list_advisor_targets(&city, month).await
    }

    /// Stores a batch of normalized operational rows.
    pub async fn ingest_service_records(
        &self,
        actor: &UserIdentity,
        records: Vec<ServiceRecord>,
    ) -> AppResult<usize> {
        self.resolver
            .require_permission(actor, Permission::Upload)
            .await?;

        let stored = self.records.ingest(records).await?;
        info!(actor = actor.email(), rows = stored, "ingested service records");
        Ok(stored)
    }

    /// Computes one advisor's achievement for a month.
    ///
    /// An advisor without a distributed target is reported against a zero
    /// target, so every metric shows 0% rather than failing the view.
    pub async fn advisor_achievement(
        &self,
        actor: &UserIdentity,
        advisor: &str,
        month: MonthKey,
        as_of: NaiveDate,
    ) -> AppResult<AdvisorAchievement> {
        self.resolver
            .require_permission(actor, Permission::AdvisorPerformance)
            .await?;

        let advisor = normalize_advisor_name(advisor);
        if advisor.is_empty() {
            return Err(AppError::Validation(
                "advisor name must not be empty".to_owned(),
            ));
        }

        let target = self.targets.find_advisor_target(&advisor, month).await?;
        let records = self.records.list_for_advisor(&advisor, month).await?;
        let days = pace_window(month, as_of);

        let (city, metrics) = match target {
            Some(target) => (target.city, target.metrics),
            None => (String::new(), TargetMetrics::default()),
        };

        Ok(AdvisorAchievement {
            advisor,
            city,
            month,
            summary: AchievementSummary::compute(&metrics, &records, days),
        })
    }

    /// Computes a city's achievement for a month, with per-advisor detail.
    pub async fn city_achievement(
        &self,
        actor: &UserIdentity,
        city: &str,
        month: MonthKey,
        as_of: NaiveDate,
    ) -> AppResult<CityAchievement> {
        self.resolver
            .require_permission(actor, Permission::Overview)
            .await?;

        let city = normalize_city(city)?;
        let city_metrics = self
            .targets
            .find_city_target(&city, month)
            .await?
            .map(|target| target.metrics)
            .unwrap_or_default();

        let records = self.records.list_for_city(&city, month).await?;
        let days = pace_window(month, as_of);
        let summary = AchievementSummary::compute(&city_metrics, &records, days);

        let mut advisors = Vec::new();
        for target in self.targets.list_advisor_targets(&city, month).await? {
            let own_records: Vec<_> = records
                .iter()
                .filter(|record| record.advisor() == target.advisor)
                .cloned()
                .collect();

            advisors.push(AdvisorAchievement {
                advisor: target.advisor,
                city: city.clone(),
                month,
                summary: AchievementSummary::compute(&target.metrics, &own_records, days),
            });
        }

        Ok(CityAchievement {
            city,
            month,
            summary,
            advisors,
        })
    }

    async fn append_audit(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        resource_id: String,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                actor_email: actor.email().to_owned(),
                action,
                resource_type: "target".to_owned(),
                resource_id,
                detail,
            })
            .await
    }
}

/// Normalizes a city name the same way ingested rows are normalized.
fn normalize_city(city: &str) -> AppResult<String> {
    let normalized = city.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AppError::Validation(
            "city name must not be empty".to_owned(),
        ));
    }

    Ok(normalized)
}

/// Picks the pace divisor for a month viewed on `as_of`.
///
/// Before the month starts the whole month's working days remain; after it
/// ends the divisor collapses to 1 so shortfalls stay visible.
fn pace_window(month: MonthKey, as_of: NaiveDate) -> u32 {
    if as_of < month.first_day() {
        remaining_working_days(month.first_day())
    } else if as_of > month.last_day() {
        1
    } else {
        remaining_working_days(as_of)
    }
}
