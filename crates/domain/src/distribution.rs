use std::collections::BTreeMap;

use drivelane_core::{AppError, AppResult};

use crate::target::{TargetMetrics, normalize_advisor_name};

/// One manual distribution pass over a city's advisor roster.
///
/// Tracks which advisors are still unassigned so the same advisor cannot
/// receive two manual targets within one pass. Names are normalized on
/// entry, so roster and assignment spellings may differ in case.
#[derive(Debug, Clone)]
pub struct ManualDistribution {
    assigned: BTreeMap<String, TargetMetrics>,
    unassigned: Vec<String>,
}

impl ManualDistribution {
    /// Starts a pass over the given advisor roster.
    pub fn new(advisors: &[String]) -> AppResult<Self> {
        let mut unassigned: Vec<String> = Vec::with_capacity(advisors.len());
        for advisor in advisors {
            let normalized = normalize_advisor_name(advisor);
            if normalized.is_empty() {
                return Err(AppError::Validation(
                    "advisor roster entries must not be empty".to_owned(),
                ));
            }

            if unassigned.contains(&normalized) {
                return Err(AppError::Validation(format!(
                    "advisor '{normalized}' appears twice in the roster"
                )));
            }

            unassigned.push(normalized);
        }

        if unassigned.is_empty() {
            return Err(AppError::Validation(
                "manual distribution needs at least one advisor".to_owned(),
            ));
        }

        Ok(Self {
            assigned: BTreeMap::new(),
            unassigned,
        })
    }

    /// Assigns a target to one advisor from the roster.
    ///
    /// Rejects advisors outside the roster and advisors already assigned in
    /// this pass.
    pub fn assign(&mut self, advisor: &str, target: TargetMetrics) -> AppResult<()> {
        let normalized = normalize_advisor_name(advisor);

        if self.assigned.contains_key(&normalized) {
            return Err(AppError::Conflict(format!(
                "advisor '{normalized}' already received a target in this pass"
            )));
        }

        let Some(position) = self
            .unassigned
            .iter()
            .position(|candidate| candidate == &normalized)
        else {
            return Err(AppError::NotFound(format!(
                "advisor '{normalized}' is not on this distribution roster"
            )));
        };

        self.unassigned.remove(position);
        self.assigned.insert(normalized, target);
        Ok(())
    }

    /// Returns advisors that have not received a target yet.
    #[must_use]
    pub fn unassigned(&self) -> &[String] {
        self.unassigned.as_slice()
    }

    /// Returns true once every roster advisor has a target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unassigned.is_empty()
    }

    /// Returns the assignments made so far, in stable advisor order.
    #[must_use]
    pub fn assignments(&self) -> &BTreeMap<String, TargetMetrics> {
        &self.assigned
    }
}
