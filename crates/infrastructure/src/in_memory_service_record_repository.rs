use async_trait::async_trait;
use tokio::sync::RwLock;

use drivelane_application::ServiceRecordRepository;
use drivelane_core::AppResult;
use drivelane_domain::{MonthKey, ServiceRecord};

/// In-memory service-record store for tests and local development.
#[derive(Default)]
pub struct InMemoryServiceRecordRepository {
    records: RwLock<Vec<ServiceRecord>>,
}

impl InMemoryServiceRecordRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceRecordRepository for InMemoryServiceRecordRepository {
    async fn ingest(&self, records: Vec<ServiceRecord>) -> AppResult<usize> {
        let stored = records.len();
        self.records.write().await.extend(records);
        Ok(stored)
    }

    async fn list_for_city(&self, city: &str, month: MonthKey) -> AppResult<Vec<ServiceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.city() == city && month.contains(record.closed_on()))
            .cloned()
            .collect())
    }

    async fn list_for_advisor(
        &self,
        advisor: &str,
        month: MonthKey,
    ) -> AppResult<Vec<ServiceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.advisor() == advisor && month.contains(record.closed_on()))
            .cloned()
            .collect())
    }
}
