//! Monthly targets, ingested service records, and achievement arithmetic.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use drivelane_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A calendar month key, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Creates a validated month key.
    pub fn new(year: i32, month: u32) -> AppResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }

        if !(2000..=2100).contains(&year) {
            return Err(AppError::Validation(format!(
                "year {year} is outside the supported range"
            )));
        }

        Ok(Self { year, month })
    }

    /// Returns the calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Returns the calendar month (1-12).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Returns the first day of the month.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Returns the last day of the month.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };

        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .unwrap_or_default()
    }

    /// Returns whether the date falls inside this month.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for MonthKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.splitn(2, '-').collect();
        if parts.len() != 2 {
            return Err(AppError::Validation(format!(
                "month key '{value}' must use the YYYY-MM format"
            )));
        }

        let year = parts[0].parse::<i32>().map_err(|_| {
            AppError::Validation(format!("invalid year in month key '{value}'"))
        })?;
        let month = parts[1].parse::<u32>().map_err(|_| {
            AppError::Validation(format!("invalid month in month key '{value}'"))
        })?;

        Self::new(year, month)
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{:04}-{:02}", self.year, self.month)
    }
}

/// The six tracked metrics of a monthly target.
///
/// Monetary amounts are whole currency units; the rest are vehicle counts.
/// Non-negativity is guaranteed by the unsigned representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMetrics {
    /// Labour revenue target.
    pub labour: u64,
    /// Parts revenue target.
    pub parts: u64,
    /// Total vehicle count target.
    pub total_vehicles: u64,
    /// Paid-service vehicle count target.
    pub paid_service: u64,
    /// Free-service vehicle count target.
    pub free_service: u64,
    /// Running-repair vehicle count target.
    pub rr: u64,
}

/// Splits a city target evenly across `advisor_count` advisors.
///
/// Every metric is floor-divided; the remainder is not redistributed, so the
/// sum across advisors never exceeds the city target and may fall short of it
/// by at most `advisor_count - 1` units per metric.
pub fn divide_evenly(target: TargetMetrics, advisor_count: u64) -> AppResult<TargetMetrics> {
    if advisor_count == 0 {
        return Err(AppError::Validation(
            "cannot distribute a target across zero advisors".to_owned(),
        ));
    }

    Ok(TargetMetrics {
        labour: target.labour / advisor_count,
        parts: target.parts / advisor_count,
        total_vehicles: target.total_vehicles / advisor_count,
        paid_service: target.paid_service / advisor_count,
        free_service: target.free_service / advisor_count,
        rr: target.rr / advisor_count,
    })
}

/// Normalized work-type category, decided once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    /// Paid service visit.
    Paid,
    /// Free (warranty-period) service visit.
    Free,
    /// Running repair visit.
    RunningRepair,
    /// Anything the classifier could not place.
    Other,
}

/// Free-text spellings of "running repair" seen across dealer exports.
const RUNNING_REPAIR_SYNONYMS: &[&str] = &["r&r", "r and r", "running repair", "rr", "running"];

impl ServiceCategory {
    /// Classifies a free-text work-type cell from a spreadsheet export.
    ///
    /// Matching happens on the trimmed, lowercased value: running-repair
    /// synonyms are matched exactly, then "paid"/"free" as substrings.
    #[must_use]
    pub fn classify(work_type: &str) -> Self {
        let normalized = work_type.trim().to_lowercase();

        if RUNNING_REPAIR_SYNONYMS.contains(&normalized.as_str()) {
            return Self::RunningRepair;
        }

        if normalized.contains("paid") {
            return Self::Paid;
        }

        if normalized.contains("free") {
            return Self::Free;
        }

        Self::Other
    }

    /// Returns a stable storage value for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Free => "free",
            Self::RunningRepair => "running_repair",
            Self::Other => "other",
        }
    }
}

impl FromStr for ServiceCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "paid" => Ok(Self::Paid),
            "free" => Ok(Self::Free),
            "running_repair" => Ok(Self::RunningRepair),
            "other" => Ok(Self::Other),
            _ => Err(AppError::Validation(format!(
                "unknown service category '{value}'"
            ))),
        }
    }
}

/// Normalizes an advisor name for matching across datasets.
///
/// Advisor names arrive as free text; matching is exact equality after
/// trimming and lowercasing, never substring matching.
#[must_use]
pub fn normalize_advisor_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One ingested operational row, already normalized and classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    advisor: String,
    city: String,
    category: ServiceCategory,
    labour_amount: f64,
    parts_amount: f64,
    closed_on: NaiveDate,
}

impl ServiceRecord {
    /// Creates a normalized record from raw export values.
    pub fn new(
        advisor: impl Into<String>,
        city: impl Into<String>,
        work_type: &str,
        labour_amount: f64,
        parts_amount: f64,
        closed_on: NaiveDate,
    ) -> AppResult<Self> {
        let category = ServiceCategory::classify(work_type);
        Self::from_parts(advisor, city, category, labour_amount, parts_amount, closed_on)
    }

    /// Rebuilds a record whose category was already decided at ingestion.
    ///
    /// Stores use this when reading rows back; the classifier runs once per
    /// row, never again.
    pub fn from_parts(
        advisor: impl Into<String>,
        city: impl Into<String>,
        category: ServiceCategory,
        labour_amount: f64,
        parts_amount: f64,
        closed_on: NaiveDate,
    ) -> AppResult<Self> {
        let advisor = normalize_advisor_name(&advisor.into());
        if advisor.is_empty() {
            return Err(AppError::Validation(
                "service record advisor name must not be empty".to_owned(),
            ));
        }

        for (label, amount) in [("labour", labour_amount), ("parts", parts_amount)] {
            if !amount.is_finite() || amount < 0.0 {
                return Err(AppError::Validation(format!(
                    "{label} amount must be a non-negative number"
                )));
            }
        }

        Ok(Self {
            advisor,
            city: city.into().trim().to_lowercase(),
            category,
            labour_amount,
            parts_amount,
            closed_on,
        })
    }

    /// Returns the normalized advisor name.
    #[must_use]
    pub fn advisor(&self) -> &str {
        self.advisor.as_str()
    }

    /// Returns the normalized city name.
    #[must_use]
    pub fn city(&self) -> &str {
        self.city.as_str()
    }

    /// Returns the classified work-type category.
    #[must_use]
    pub fn category(&self) -> ServiceCategory {
        self.category
    }

    /// Returns the labour revenue on the row.
    #[must_use]
    pub fn labour_amount(&self) -> f64 {
        self.labour_amount
    }

    /// Returns the parts revenue on the row.
    #[must_use]
    pub fn parts_amount(&self) -> f64 {
        self.parts_amount
    }

    /// Returns the repair-order close date.
    #[must_use]
    pub fn closed_on(&self) -> NaiveDate {
        self.closed_on
    }
}

/// Counts calendar days from `as_of` to the end of its month, Sundays
/// excluded, floored at 1 so downstream division is always defined.
#[must_use]
pub fn remaining_working_days(as_of: NaiveDate) -> u32 {
    let working_days = as_of
        .iter_days()
        .take_while(|day| day.year() == as_of.year() && day.month() == as_of.month())
        .filter(|day| day.weekday() != Weekday::Sun)
        .count() as u32;

    working_days.max(1)
}

/// Target-versus-achieved figures for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricAchievement {
    /// Assigned target value.
    pub target: f64,
    /// Achieved value summed or counted from ingested rows.
    pub achieved: f64,
    /// Achievement percentage; 0 when the target is 0, never NaN/Infinity.
    pub percent: f64,
    /// Remaining gap, clamped at 0.
    pub shortfall: f64,
    /// Daily pace required over the remaining working days.
    pub per_day_required: f64,
}

impl MetricAchievement {
    /// Computes derived figures for one metric.
    ///
    /// `remaining_working_days` is floored at 1 before dividing.
    #[must_use]
    pub fn compute(target: f64, achieved: f64, remaining_working_days: u32) -> Self {
        let percent = if target > 0.0 {
            achieved / target * 100.0
        } else {
            0.0
        };
        let shortfall = (target - achieved).max(0.0);
        let days = f64::from(remaining_working_days.max(1));

        Self {
            target,
            achieved,
            percent,
            shortfall,
            per_day_required: (shortfall / days).ceil(),
        }
    }
}

/// Per-metric achievement snapshot for one advisor or one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementSummary {
    /// Labour revenue achievement.
    pub labour: MetricAchievement,
    /// Parts revenue achievement.
    pub parts: MetricAchievement,
    /// Total vehicle count achievement.
    pub total_vehicles: MetricAchievement,
    /// Paid-service count achievement.
    pub paid_service: MetricAchievement,
    /// Free-service count achievement.
    pub free_service: MetricAchievement,
    /// Running-repair count achievement.
    pub rr: MetricAchievement,
}

impl AchievementSummary {
    /// Computes the summary from a target and already-filtered records.
    ///
    /// Callers filter `records` to the advisor or city in question first;
    /// no name matching happens here.
    #[must_use]
    pub fn compute(
        target: &TargetMetrics,
        records: &[ServiceRecord],
        remaining_working_days: u32,
    ) -> Self {
        let labour: f64 = records.iter().map(ServiceRecord::labour_amount).sum();
        let parts: f64 = records.iter().map(ServiceRecord::parts_amount).sum();
        let count_of = |category: ServiceCategory| -> f64 {
            records
                .iter()
                .filter(|record| record.category() == category)
                .count() as f64
        };

        Self {
            labour: MetricAchievement::compute(
                target.labour as f64,
                labour,
                remaining_working_days,
            ),
            parts: MetricAchievement::compute(
                target.parts as f64,
                parts,
                remaining_working_days,
            ),
            total_vehicles: MetricAchievement::compute(
                target.total_vehicles as f64,
                records.len() as f64,
                remaining_working_days,
            ),
            paid_service: MetricAchievement::compute(
                target.paid_service as f64,
                count_of(ServiceCategory::Paid),
                remaining_working_days,
            ),
            free_service: MetricAchievement::compute(
                target.free_service as f64,
                count_of(ServiceCategory::Free),
                remaining_working_days,
            ),
            rr: MetricAchievement::compute(
                target.rr as f64,
                count_of(ServiceCategory::RunningRepair),
                remaining_working_days,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::{
        AchievementSummary, MetricAchievement, MonthKey, ServiceCategory, ServiceRecord,
        TargetMetrics, divide_evenly, normalize_advisor_name, remaining_working_days,
    };

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| unreachable!())
    }

    #[test]
    fn month_key_parses_and_formats() {
        let key = MonthKey::from_str("2026-08").ok();
        assert_eq!(key.as_ref().map(MonthKey::year), Some(2026));
        assert_eq!(key.map(|key| key.to_string()).as_deref(), Some("2026-08"));
        assert!(MonthKey::from_str("2026-13").is_err());
        assert!(MonthKey::from_str("august").is_err());
    }

    #[test]
    fn month_key_knows_its_bounds() {
        let key = MonthKey::new(2026, 2);
        assert!(key.is_ok());
        if let Ok(key) = key {
            assert_eq!(key.first_day(), date(2026, 2, 1));
            assert_eq!(key.last_day(), date(2026, 2, 28));
            assert!(key.contains(date(2026, 2, 14)));
            assert!(!key.contains(date(2026, 3, 1)));
        }
    }

    #[test]
    fn even_split_floors_without_redistribution() {
        let split = divide_evenly(
            TargetMetrics {
                labour: 100,
                parts: 50,
                ..TargetMetrics::default()
            },
            4,
        );
        assert!(split.is_ok());
        if let Ok(split) = split {
            assert_eq!(split.labour, 25);
            assert_eq!(split.parts, 12);
            // Four advisors at 12 leave 2 parts unallocated; that slack is accepted.
            assert!(split.parts * 4 <= 50);
        }
    }

    #[test]
    fn even_split_three_advisor_scenario() {
        let split = divide_evenly(
            TargetMetrics {
                labour: 90_000,
                parts: 30_000,
                total_vehicles: 30,
                ..TargetMetrics::default()
            },
            3,
        );
        assert!(split.is_ok());
        if let Ok(split) = split {
            assert_eq!(split.labour, 30_000);
            assert_eq!(split.parts, 10_000);
            assert_eq!(split.total_vehicles, 10);
        }
    }

    #[test]
    fn even_split_rejects_zero_advisors() {
        assert!(divide_evenly(TargetMetrics::default(), 0).is_err());
    }

    #[test]
    fn classifier_maps_running_repair_synonyms() {
        for spelling in ["r&r", "R AND R", " rr ", "Running Repair", "running"] {
            assert_eq!(
                ServiceCategory::classify(spelling),
                ServiceCategory::RunningRepair,
                "spelling '{spelling}' should classify as running repair"
            );
        }
    }

    #[test]
    fn classifier_maps_paid_free_and_other() {
        assert_eq!(ServiceCategory::classify("Paid Service"), ServiceCategory::Paid);
        assert_eq!(ServiceCategory::classify("3rd FREE service"), ServiceCategory::Free);
        assert_eq!(ServiceCategory::classify("bodyshop"), ServiceCategory::Other);
    }

    #[test]
    fn advisor_names_normalize_for_exact_matching() {
        assert_eq!(normalize_advisor_name("  Ramesh KUMAR "), "ramesh kumar");
        assert_eq!(
            normalize_advisor_name("ramesh kumar"),
            normalize_advisor_name("RAMESH KUMAR")
        );
    }

    #[test]
    fn service_record_rejects_negative_amounts() {
        let record = ServiceRecord::new(
            "Ramesh",
            "Pune",
            "paid",
            -10.0,
            0.0,
            date(2026, 8, 10),
        );
        assert!(record.is_err());
    }

    #[test]
    fn remaining_working_days_excludes_sundays() {
        // 2026-08-24 is a Monday; the month ends Monday the 31st with one
        // Sunday (the 30th) in between.
        assert_eq!(remaining_working_days(date(2026, 8, 24)), 7);
    }

    #[test]
    fn remaining_working_days_floors_at_one() {
        // 2026-08-30 is the last Sunday of the month: the only remaining
        // non-Sunday day is the 31st.
        assert_eq!(remaining_working_days(date(2026, 8, 30)), 1);
        assert_eq!(remaining_working_days(date(2026, 8, 31)), 1);
    }

    #[test]
    fn zero_target_reports_zero_percent_not_nan() {
        let achievement = MetricAchievement::compute(0.0, 12.0, 5);
        assert_eq!(achievement.percent, 0.0);
        assert!(achievement.per_day_required.is_finite());
    }

    #[test]
    fn summary_counts_categories_and_sums_revenue() {
        let records = vec![
            record("paid", 1_000.0, 300.0),
            record("paid service", 2_000.0, 200.0),
            record("free", 0.0, 0.0),
            record("rr", 500.0, 100.0),
        ];
        let target = TargetMetrics {
            labour: 10_000,
            parts: 1_000,
            total_vehicles: 10,
            paid_service: 5,
            free_service: 2,
            rr: 3,
        };

        let summary = AchievementSummary::compute(&target, &records, 5);
        assert_eq!(summary.labour.achieved, 3_500.0);
        assert_eq!(summary.parts.achieved, 600.0);
        assert_eq!(summary.total_vehicles.achieved, 4.0);
        assert_eq!(summary.paid_service.achieved, 2.0);
        assert_eq!(summary.free_service.achieved, 1.0);
        assert_eq!(summary.rr.achieved, 1.0);
        assert_eq!(summary.labour.shortfall, 6_500.0);
        assert_eq!(summary.labour.per_day_required, 1_300.0);
    }

    fn record(work_type: &str, labour: f64, parts: f64) -> ServiceRecord {
        ServiceRecord::new("Ramesh", "Pune", work_type, labour, parts, date(2026, 8, 10))
            .unwrap_or_else(|_| unreachable!())
    }

    proptest! {
        #[test]
        fn shortfall_is_never_negative(target in 0.0f64..1e9, achieved in 0.0f64..1e9) {
            let achievement = MetricAchievement::compute(target, achieved, 5);
            prop_assert!(achievement.shortfall >= 0.0);
        }

        #[test]
        fn per_day_required_is_always_finite(
            target in 0.0f64..1e9,
            achieved in 0.0f64..1e9,
            days in 0u32..60,
        ) {
            let achievement = MetricAchievement::compute(target, achieved, days);
            prop_assert!(achievement.per_day_required.is_finite());
            prop_assert!(achievement.percent.is_finite());
        }

        #[test]
        fn distributed_sum_never_exceeds_the_city_target(
            labour in 0u64..10_000_000,
            parts in 0u64..10_000_000,
            vehicles in 0u64..10_000,
            advisors in 1u64..50,
        ) {
            let target = TargetMetrics {
                labour,
                parts,
                total_vehicles: vehicles,
                ..TargetMetrics::default()
            };
            let split = divide_evenly(target, advisors);
            prop_assert!(split.is_ok());
            if let Ok(split) = split {
                prop_assert!(split.labour * advisors <= labour);
                prop_assert!(split.parts * advisors <= parts);
                prop_assert!(split.total_vehicles * advisors <= vehicles);
                // Rounding slack stays below one unit per advisor.
                prop_assert!(labour - split.labour * advisors < advisors);
            }
        }
    }
}
