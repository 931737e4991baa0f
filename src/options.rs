//! Boundary configuration: cost vector, task selection, and run limits.
//!
//! Validated once via [`ReconciliationOptions::validate`] before the DP
//! engine runs; invalid options never reach the engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// T1: all optimal reconciliations (count or enumerate, no equivalence).
    AllSolutions,
    /// T2: aggregate optimal reconciliations by event vector.
    EventVectors,
    /// T3: aggregate by event-partition equivalence.
    EventPartition,
    /// T4: aggregate by CD-equivalence.
    CdEquivalence,
    /// Enumerate the K lowest-cost reconciliations (requires `best_k`).
    BestK,
}

/// Four signed per-event costs. Cospeciation is conventionally given a
/// negative cost (a reward) so the DP favors it over other events when
/// several reconciliations would otherwise tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostVector {
    pub cospeciation: i32,
    pub duplication: i32,
    pub host_switch: i32,
    pub loss: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationOptions {
    pub cost: CostVector,
    pub task: Task,
    /// Maximum allowed host-switch distance (sibling-spine hops). `None`
    /// means unbounded.
    pub distance_threshold: Option<u32>,
    /// Scales the (small, rational-looking) cost vector up to integers
    /// before the DP runs, so every intermediate cost stays an exact `i64`.
    pub cost_multiplier: u32,
    /// Restrict to reconciliations whose induced temporal constraints are
    /// acyclic (no time-travel via host-switch).
    pub acyclic_only: bool,
    /// Required, and must be positive, when enumerating with a cap or
    /// running the Best-K policy.
    pub maximum: Option<u64>,
    pub best_k: Option<u64>,
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self {
            cost: CostVector {
                cospeciation: 0,
                duplication: 1,
                host_switch: 1,
                loss: 1,
            },
            task: Task::AllSolutions,
            distance_threshold: None,
            cost_multiplier: 1000,
            acyclic_only: false,
            maximum: None,
            best_k: None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OptionError {
    #[error("cost multiplier must be positive")]
    InvalidCostVector,
    #[error("maximum must be positive when provided")]
    NonPositiveMaximum,
    #[error("k must be positive for the best-k task")]
    NonPositiveK,
    #[error("distance threshold must be positive when provided")]
    InvalidDistanceThreshold,
    #[error("task is Best-K but no k was provided")]
    InvalidTask,
}

impl ReconciliationOptions {
    pub fn validate(&self) -> Result<(), OptionError> {
        if self.cost_multiplier == 0 {
            return Err(OptionError::InvalidCostVector);
        }
        if matches!(self.maximum, Some(0)) {
            return Err(OptionError::NonPositiveMaximum);
        }
        if matches!(self.best_k, Some(0)) {
            return Err(OptionError::NonPositiveK);
        }
        if matches!(self.distance_threshold, Some(0)) {
            return Err(OptionError::InvalidDistanceThreshold);
        }
        if self.task == Task::BestK && self.best_k.is_none() {
            return Err(OptionError::InvalidTask);
        }
        Ok(())
    }

    /// The cost vector scaled by [`Self::cost_multiplier`], as the engine
    /// consumes it.
    pub fn scaled_cost(&self) -> ScaledCostVector {
        let m = self.cost_multiplier as i64;
        ScaledCostVector {
            cospeciation: self.cost.cospeciation as i64 * m,
            duplication: self.cost.duplication as i64 * m,
            host_switch: self.cost.host_switch as i64 * m,
            loss: self.cost.loss as i64 * m,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScaledCostVector {
    pub cospeciation: i64,
    pub duplication: i64,
    pub host_switch: i64,
    pub loss: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(ReconciliationOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let mut opts = ReconciliationOptions::default();
        opts.cost_multiplier = 0;
        assert!(matches!(
            opts.validate(),
            Err(OptionError::InvalidCostVector)
        ));
    }

    #[test]
    fn scaled_cost_applies_multiplier() {
        let mut opts = ReconciliationOptions::default();
        opts.cost_multiplier = 1000;
        opts.cost.duplication = 2;
        assert_eq!(opts.scaled_cost().duplication, 2000);
    }

    #[test]
    fn zero_distance_threshold_is_rejected() {
        let mut opts = ReconciliationOptions::default();
        opts.distance_threshold = Some(0);
        assert!(matches!(
            opts.validate(),
            Err(OptionError::InvalidDistanceThreshold)
        ));
    }

    #[test]
    fn best_k_task_without_k_is_rejected() {
        let mut opts = ReconciliationOptions::default();
        opts.task = Task::BestK;
        assert!(matches!(opts.validate(), Err(OptionError::InvalidTask)));
    }

    #[test]
    fn best_k_task_with_k_is_valid() {
        let mut opts = ReconciliationOptions::default();
        opts.task = Task::BestK;
        opts.best_k = Some(5);
        assert!(opts.validate().is_ok());
    }
}
