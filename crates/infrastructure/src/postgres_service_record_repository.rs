use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use drivelane_application::ServiceRecordRepository;
use drivelane_core::{AppError, AppResult};
use drivelane_domain::{MonthKey, ServiceCategory, ServiceRecord};

/// PostgreSQL-backed store for ingested operational rows.
#[derive(Clone)]
pub struct PostgresServiceRecordRepository {
    pool: PgPool,
}

impl PostgresServiceRecordRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ServiceRecordRow {
    advisor: String,
    city: String,
    category: String,
    labour_amount: f64,
    parts_amount: f64,
    closed_on: chrono::NaiveDate,
}

#[async_trait]
impl ServiceRecordRepository for PostgresServiceRecordRepository {
    async fn ingest(&self, records: Vec<ServiceRecord>) -> AppResult<usize> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO service_records (
                    advisor, city, category, labour_amount, parts_amount, closed_on
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(record.advisor())
            .bind(record.city())
            .bind(record.category().as_str())
            .bind(record.labour_amount())
            .bind(record.parts_amount())
            .bind(record.closed_on())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist service record: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(records.len())
    }

    async fn list_for_city(&self, city: &str, month: MonthKey) -> AppResult<Vec<ServiceRecord>> {
        let rows = sqlx::query_as::<_, ServiceRecordRow>(
            r#"
            SELECT advisor, city, category, labour_amount, parts_amount, closed_on
            FROM service_records
            WHERE city = $1 AND closed_on BETWEEN $2 AND $3
            ORDER BY closed_on, advisor
            "#,
        )
        .bind(city)
        .bind(month.first_day())
        .bind(month.last_day())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list service records: {error}"))
        })?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn list_for_advisor(
        &self,
        advisor: &str,
        month: MonthKey,
    ) -> AppResult<Vec<ServiceRecord>> {
        let rows = sqlx::query_as::<_, ServiceRecordRow>(
            r#"
            SELECT advisor, city, category, labour_amount, parts_amount, closed_on
            FROM service_records
            WHERE advisor = $1 AND closed_on BETWEEN $2 AND $3
            ORDER BY closed_on
            "#,
        )
        .bind(advisor)
        .bind(month.first_day())
        .bind(month.last_day())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list service records: {error}"))
        })?;

        rows.into_iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: ServiceRecordRow) -> AppResult<ServiceRecord> {
    let category = ServiceCategory::from_str(row.category.as_str()).map_err(|error| {
        AppError::Internal(format!(
            "invalid stored service category '{}': {error}",
            row.category
        ))
    })?;

    ServiceRecord::from_parts(
        row.advisor,
        row.city,
        category,
        row.labour_amount,
        row.parts_amount,
        row.closed_on,
    )
}
