use async_trait::async_trait;
use chrono::Datelike;
use sqlx::{FromRow, PgPool};

use drivelane_application::{AdvisorTarget, CityTarget, TargetRepository};
use drivelane_core::{AppError, AppResult};
use drivelane_domain::{MonthKey, TargetMetrics};

/// PostgreSQL-backed repository for city and advisor targets.
///
/// Months are stored as the first day of the month; saves upsert so a city
/// holds at most one target row per month.
#[derive(Clone)]
pub struct PostgresTargetRepository {
    pool: PgPool,
}

impl PostgresTargetRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CityTargetRow {
    city: String,
    month: chrono::NaiveDate,
    labour: i64,
    parts: i64,
    total_vehicles: i64,
    paid_service: i64,
    free_service: i64,
    rr: i64,
}

#[derive(Debug, FromRow)]
struct AdvisorTargetRow {
    city: String,
    month: chrono::NaiveDate,
    advisor: String,
    labour: i64,
    parts: i64,
    total_vehicles: i64,
    paid_service: i64,
    free_service: i64,
    rr: i64,
}

#[async_trait]
impl TargetRepository for PostgresTargetRepository {
    async fn save_city_target(&self, target: CityTarget) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO city_targets (
                city, month, labour, parts, total_vehicles,
                paid_service, free_service, rr
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (city, month) DO UPDATE SET
                labour = EXCLUDED.labour,
                parts = EXCLUDED.parts,
                total_vehicles = EXCLUDED.total_vehicles,
                paid_service = EXCLUDED.paid_service,
                free_service = EXCLUDED.free_service,
                rr = EXCLUDED.rr
            "#,
        )
        .bind(target.city.as_str())
        .bind(target.month.first_day())
        .bind(to_db(target.metrics.labour)?)
        .bind(to_db(target.metrics.parts)?)
        .bind(to_db(target.metrics.total_vehicles)?)
        .bind(to_db(target.metrics.paid_service)?)
        .bind(to_db(target.metrics.free_service)?)
        .bind(to_db(target.metrics.rr)?)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save city target: {error}")))?;

        Ok(())
    }

    async fn find_city_target(
        &self,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Option<CityTarget>> {
        let row = sqlx::query_as::<_, CityTargetRow>(
            r#"
            SELECT city, month, labour, parts, total_vehicles,
                   paid_service, free_service, rr
            FROM city_targets
            WHERE city = $1 AND month = $2
            "#,
        )
        .bind(city)
        .bind(month.first_day())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load city target: {error}")))?;

        row.map(city_target_from_row).transpose()
    }

    async fn replace_advisor_targets(
        &self,
        city: &str,
        month: MonthKey,
        targets: Vec<AdvisorTarget>,
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            DELETE FROM advisor_targets
            WHERE city = $1 AND month = $2
            "#,
        )
        .bind(city)
        .bind(month.first_day())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to clear advisor targets: {error}"))
        })?;

        for target in &targets {
            sqlx::query(
                r#"
                INSERT INTO advisor_targets (
                    city, month, advisor, labour, parts, total_vehicles,
                    paid_service, free_service, rr
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(target.city.as_str())
            .bind(target.month.first_day())
            .bind(target.advisor.as_str())
            .bind(to_db(target.metrics.labour)?)
            .bind(to_db(target.metrics.parts)?)
            .bind(to_db(target.metrics.total_vehicles)?)
            .bind(to_db(target.metrics.paid_service)?)
            .bind(to_db(target.metrics.free_service)?)
            .bind(to_db(target.metrics.rr)?)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist advisor target: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn list_advisor_targets(
        &self,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Vec<AdvisorTarget>> {
        let rows = sqlx::query_as::<_, AdvisorTargetRow>(
            r#"
            SELECT city, month, advisor, labour, parts, total_vehicles,
                   paid_service, free_service, rr
            FROM advisor_targets
            WHERE city = $1 AND month = $2
            ORDER BY advisor
            "#,
        )
        .bind(city)
        .bind(month.first_day())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list advisor targets: {error}"))
        })?;

        rows.into_iter().map(advisor_target_from_row).collect()
    }

    async fn find_advisor_target(
        &self,
        advisor: &str,
        month: MonthKey,
    ) -> AppResult<Option<AdvisorTarget>> {
        let row = sqlx::query_as::<_, AdvisorTargetRow>(
            r#"
            SELECT city, month, advisor, labour, parts, total_vehicles,
                   paid_service, free_service, rr
            FROM advisor_targets
            WHERE advisor = $1 AND month = $2
            "#,
        )
        .bind(advisor)
        .bind(month.first_day())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load advisor target: {error}"))
        })?;

        row.map(advisor_target_from_row).transpose()
    }
}

fn to_db(value: u64) -> AppResult<i64> {
    i64::try_from(value).map_err(|_| {
        AppError::Validation(format!("target metric {value} exceeds the storable range"))
    })
}

fn from_db(value: i64) -> AppResult<u64> {
    u64::try_from(value).map_err(|_| {
        AppError::Internal(format!("stored target metric {value} is negative"))
    })
}

fn metrics_from_columns(
    labour: i64,
    parts: i64,
    total_vehicles: i64,
    paid_service: i64,
    free_service: i64,
    rr: i64,
) -> AppResult<TargetMetrics> {
    Ok(TargetMetrics {
        labour: from_db(labour)?,
        parts: from_db(parts)?,
        total_vehicles: from_db(total_vehicles)?,
        paid_service: from_db(paid_service)?,
        free_service: from_db(free_service)?,
        rr: from_db(rr)?,
    })
}

fn month_from_date(date: chrono::NaiveDate) -> AppResult<MonthKey> {
    MonthKey::new(date.year(), date.month())
}

fn city_target_from_row(row: CityTargetRow) -> AppResult<CityTarget> {
    Ok(CityTarget {
        city: row.city,
        month: month_from_date(row.month)?,
        metrics: metrics_from_columns(
            row.labour,
            row.parts,
            row.total_vehicles,
            row.paid_service,
            row.free_service,
            row.rr,
        )?,
    })
}

fn advisor_target_from_row(row: AdvisorTargetRow) -> AppResult<AdvisorTarget> {
    Ok(AdvisorTarget {
        city: row.city,
        month: month_from_date(row.month)?,
        advisor: row.advisor,
        metrics: metrics_from_columns(
            row.labour,
            row.parts,
            row.total_vehicles,
            row.paid_service,
            row.free_service,
            row.rr,
        )?,
    })
}
