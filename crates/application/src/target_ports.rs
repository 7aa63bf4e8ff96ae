use async_trait::async_trait;
use drivelane_core::AppResult;
use drivelane_domain::{MonthKey, ServiceRecord, TargetMetrics};

/// A city's target for one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityTarget {
    /// Normalized city name.
    pub city: String,
    /// Target month.
    pub month: MonthKey,
    /// The six tracked metrics.
    pub metrics: TargetMetrics,
}

/// One advisor's share of a city target for one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorTarget {
    /// Normalized city name.
    pub city: String,
    /// Target month.
    pub month: MonthKey,
    /// Normalized advisor name.
    pub advisor: String,
    /// The six tracked metrics.
    pub metrics: TargetMetrics,
}

/// Repository port for city and advisor targets.
///
/// Saves replace: one city holds at most one target per month, and a
/// distribution run replaces the full advisor set for that city and month.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Upserts a city's monthly target.
    async fn save_city_target(&self, target: CityTarget) -> AppResult<()>;

    /// Finds a city's monthly target.
    async fn find_city_target(&self, city: &str, month: MonthKey)
    -> AppResult<Option<CityTarget>>;

    /// Replaces every advisor target for the city and month in one step.
    ///
    /// Advisors from an earlier run that are absent from `targets` lose
    /// their share; no stale rows survive a re-run.
    async fn replace_advisor_targets(
        &self,
        city: &str,
        month: MonthKey,
        targets: Vec<AdvisorTarget>,
    ) -> AppResult<()>;

    /// Lists the advisor targets for a city and month.
    async fn list_advisor_targets(
        &self,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Vec<AdvisorTarget>>;

    /// Finds one advisor's target for a month, across cities.
    async fn find_advisor_target(
        &self,
        advisor: &str,
        month: MonthKey,
    ) -> AppResult<Option<AdvisorTarget>>;
}

/// Repository port for ingested operational rows.
#[async_trait]
pub trait ServiceRecordRepository: Send + Sync {
    /// Appends a batch of normalized rows; returns the stored count.
    async fn ingest(&self, records: Vec<ServiceRecord>) -> AppResult<usize>;

    /// Lists a city's rows whose close date falls inside the month.
    async fn list_for_city(&self, city: &str, month: MonthKey) -> AppResult<Vec<ServiceRecord>>;

    /// Lists one advisor's rows whose close date falls inside the month.
    async fn list_for_advisor(
        &self,
        advisor: &str,
        month: MonthKey,
    ) -> AppResult<Vec<ServiceRecord>>;
}
