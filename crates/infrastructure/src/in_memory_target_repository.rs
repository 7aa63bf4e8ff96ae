use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use drivelane_application::{AdvisorTarget, CityTarget, TargetRepository};
use drivelane_core::AppResult;
use drivelane_domain::MonthKey;

/// In-memory target store for tests and local development.
#[derive(Default)]
pub struct InMemoryTargetRepository {
    city_targets: RwLock<HashMap<(String, MonthKey), CityTarget>>,
    advisor_targets: RwLock<Vec<AdvisorTarget>>,
}

impl InMemoryTargetRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TargetRepository for InMemoryTargetRepository {
    async fn save_city_target(&self, target: CityTarget) -> AppResult<()> {
        self.city_targets
            .write()
            .await
            .insert((target.city.clone(), target.month), target);
        Ok(())
    }

    async fn find_city_target(
        &self,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Option<CityTarget>> {
        Ok(self
            .city_targets
            .read()
            .await
            .get(&(city.to_owned(), month))
            .cloned())
    }

    async fn replace_advisor_targets(
        &self,
        city: &str,
        month: MonthKey,
        targets: Vec<AdvisorTarget>,
    ) -> AppResult<()> {
        let mut stored = self.advisor_targets.write().await;
        stored.retain(|target| !(target.city == city && target.month == month));
        stored.extend(targets);
        Ok(())
    }

    async fn list_advisor_targets(
        &self,
        city: &str,
        month: MonthKey,
    ) -> AppResult<Vec<AdvisorTarget>> {
        let mut targets: Vec<AdvisorTarget> = self
            .advisor_targets
            .read()
            .await
            .iter()
            .filter(|target| target.city == city && target.month == month)
            .cloned()
            .collect();
        targets.sort_by(|left, right| left.advisor.cmp(&right.advisor));
        Ok(targets)
    }

    async fn find_advisor_target(
        &self,
        advisor: &str,
        month: MonthKey,
    ) -> AppResult<Option<AdvisorTarget>> {
        Ok(self
            .advisor_targets
            .read()
            .await
            .iter()
            .find(|target| target.advisor == advisor && target.month == month)
            .cloned())
    }
}
