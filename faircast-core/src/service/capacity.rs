//! Event Capacity and Cost Planning
//!
//! Business-facing calculators built purely on top of the provider factory
//! and each provider's `calculate_cost`. Everything here is synchronous,
//! CPU-only and free of shared mutable state, so concurrent requests can
//! call into one service without coordination.

use crate::provider::{
    CostEstimate, CostParams, ProviderError, Result, StreamProviderFactory, StreamQuality,
};
use serde::{Deserialize, Serialize};

/// Upper bound of the viewer binary search
const MAX_VIEWER_SEARCH: i64 = 100_000;

/// Upper bound of the booth distribution search
const MAX_BOOTH_SEARCH: u32 = 100;

/// Viewer-limit fraction above which a warning is raised
const VIEWER_WARNING_RATIO: f64 = 0.9;

/// Input to [`CapacityService::capacity_from_budget`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetParams {
    pub provider: String,
    /// USD
    pub budget: f64,
    pub duration_minutes: u32,
    pub number_of_booths: u32,
    #[serde(default)]
    pub quality: StreamQuality,
    #[serde(default)]
    pub recording: bool,
}

/// Maximum audience that fits in a budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetCapacity {
    pub provider: String,
    pub budget: f64,
    pub max_concurrent_viewers: u32,
    pub number_of_booths: u32,
    pub duration_minutes: u32,
    pub estimated_cost: f64,
    /// Negative when even the zero-viewer (publisher-only) cost exceeds the
    /// budget; callers treat that as "budget insufficient for base hosting".
    pub remaining_budget: f64,
    pub breakdown: crate::provider::CostBreakdown,
    pub utilization_percentage: f64,
}

/// Input to [`CapacityService::optimal_distribution`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionParams {
    pub provider: String,
    pub budget: f64,
    pub duration_minutes: u32,
    pub estimated_peak_viewers: u32,
    #[serde(default)]
    pub quality: StreamQuality,
    #[serde(default)]
    pub recording: bool,
}

/// One feasible booth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoothConfig {
    pub number_of_booths: u32,
    /// Viewers redistribute evenly across booths; the cost model still runs
    /// on the total, since splitting booths does not reduce viewer cost.
    pub viewers_per_booth: u32,
    pub total_viewers: u32,
    pub cost: f64,
    pub breakdown: crate::provider::CostBreakdown,
}

/// Result of the booth distribution search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoothDistribution {
    pub provider: String,
    pub budget: f64,
    /// 0 when even a single booth exceeds the budget
    pub max_booths: u32,
    pub recommended_config: Option<BoothConfig>,
    pub remaining_budget: f64,
}

/// Configured limits for an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventCapacityLimits {
    pub max_concurrent_viewers: Option<u32>,
    pub max_booths: Option<u32>,
    pub budget: Option<f64>,
    pub estimated_cost: Option<f64>,
}

/// Live usage counters for an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacityUsage {
    pub current_viewers: u32,
    pub active_booths: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityValidation {
    pub valid: bool,
    pub warnings: Vec<CapacityIssue>,
    pub errors: Vec<CapacityIssue>,
}

/// Capacity and cost planning service
pub struct CapacityService {
    factory: StreamProviderFactory,
}

impl CapacityService {
    pub fn new(factory: StreamProviderFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &StreamProviderFactory {
        &self.factory
    }

    /// Cost estimate for one provider: resolve through the factory and
    /// delegate to the provider's own cost formula.
    pub fn cost_estimate(&self, provider: &str, params: &CostParams) -> Result<CostEstimate> {
        let provider = self.factory.create_provider(provider)?;
        provider.calculate_cost(params)
    }

    /// Find the maximum `peak_concurrent_users` whose estimated cost stays
    /// within the budget.
    ///
    /// Integer binary search over `[0, 100000]`. Sound because every
    /// provider's cost is monotonically non-decreasing in the viewer count
    /// (the peak-constant viewer model is load-bearing here).
    pub fn capacity_from_budget(&self, params: &BudgetParams) -> Result<BudgetCapacity> {
        validate_budget(params.budget)?;
        let provider = self.factory.create_provider(&params.provider)?;

        let cost_at = |viewers: u32| -> Result<CostEstimate> {
            provider.calculate_cost(&CostParams {
                peak_concurrent_users: viewers,
                duration_minutes: params.duration_minutes,
                number_of_booths: params.number_of_booths,
                quality: params.quality,
                recording: params.recording,
            })
        };

        let mut low: i64 = 0;
        let mut high: i64 = MAX_VIEWER_SEARCH;
        let mut optimal: u32 = 0;

        while low <= high {
            let mid = ((low + high) / 2) as u32;
            let estimate = cost_at(mid)?;

            if estimate.estimated_cost <= params.budget {
                optimal = mid;
                low = i64::from(mid) + 1;
            } else {
                high = i64::from(mid) - 1;
            }
        }

        // Even when no viewer count fits (publisher-only cost already over
        // budget), report the zero-viewer estimate instead of failing.
        let final_estimate = cost_at(optimal)?;
        let estimated_cost = final_estimate.estimated_cost;

        Ok(BudgetCapacity {
            provider: final_estimate.provider,
            budget: params.budget,
            max_concurrent_viewers: optimal,
            number_of_booths: params.number_of_booths,
            duration_minutes: params.duration_minutes,
            estimated_cost,
            remaining_budget: params.budget - estimated_cost,
            breakdown: final_estimate.breakdown,
            utilization_percentage: utilization(estimated_cost, params.budget),
        })
    }

    /// Run the same estimate across every registered provider, cheapest
    /// first.
    ///
    /// Partial-failure semantics: a provider that cannot produce an estimate
    /// (missing credentials, invalid params for it, ...) is logged and
    /// skipped; a degraded comparison beats an all-or-nothing failure.
    pub fn compare_providers(&self, params: &CostParams) -> Vec<CostEstimate> {
        let mut comparisons = Vec::new();

        for name in self.factory.available_providers() {
            match self.cost_estimate(&name, params) {
                Ok(estimate) => comparisons.push(estimate),
                Err(error) => {
                    tracing::warn!(provider = %name, %error, "skipping provider in cost comparison");
                }
            }
        }

        comparisons.sort_by(|a, b| a.estimated_cost.total_cmp(&b.estimated_cost));
        comparisons
    }

    /// Find the maximum booth count whose cost stays within budget.
    ///
    /// Linear search over 1..=100; cost is monotonically non-decreasing in
    /// booth count, so the first over-budget count ends the search.
    pub fn optimal_distribution(&self, params: &DistributionParams) -> Result<BoothDistribution> {
        validate_budget(params.budget)?;
        let provider = self.factory.create_provider(&params.provider)?;

        let mut max_booths = 0;
        let mut best_config: Option<BoothConfig> = None;

        for booths in 1..=MAX_BOOTH_SEARCH {
            let estimate = provider.calculate_cost(&CostParams {
                peak_concurrent_users: params.estimated_peak_viewers,
                duration_minutes: params.duration_minutes,
                number_of_booths: booths,
                quality: params.quality,
                recording: params.recording,
            })?;

            if estimate.estimated_cost > params.budget {
                break;
            }

            max_booths = booths;
            best_config = Some(BoothConfig {
                number_of_booths: booths,
                viewers_per_booth: params.estimated_peak_viewers / booths,
                total_viewers: params.estimated_peak_viewers,
                cost: estimate.estimated_cost,
                breakdown: estimate.breakdown,
            });
        }

        let remaining_budget = best_config
            .as_ref()
            .map_or(params.budget, |config| params.budget - config.cost);

        Ok(BoothDistribution {
            provider: params.provider.clone(),
            budget: params.budget,
            max_booths,
            recommended_config: best_config,
            remaining_budget,
        })
    }

    /// Stateless rule check of live usage against configured event limits
    pub fn validate_event_capacity(
        limits: &EventCapacityLimits,
        usage: &CapacityUsage,
    ) -> CapacityValidation {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(max_viewers) = limits.max_concurrent_viewers {
            if usage.current_viewers > max_viewers {
                errors.push(CapacityIssue {
                    field: "viewers".to_string(),
                    message: format!(
                        "Current viewers ({}) exceeds limit ({max_viewers})",
                        usage.current_viewers
                    ),
                });
            } else if f64::from(usage.current_viewers)
                > f64::from(max_viewers) * VIEWER_WARNING_RATIO
            {
                warnings.push(CapacityIssue {
                    field: "viewers".to_string(),
                    message: format!(
                        "Approaching viewer limit ({}/{max_viewers})",
                        usage.current_viewers
                    ),
                });
            }
        }

        if let Some(max_booths) = limits.max_booths {
            if usage.active_booths > max_booths {
                errors.push(CapacityIssue {
                    field: "booths".to_string(),
                    message: format!(
                        "Active booths ({}) exceeds limit ({max_booths})",
                        usage.active_booths
                    ),
                });
            }
        }

        if let (Some(budget), Some(estimated_cost)) = (limits.budget, limits.estimated_cost) {
            if estimated_cost > budget {
                warnings.push(CapacityIssue {
                    field: "budget".to_string(),
                    message: format!(
                        "Estimated cost (${estimated_cost}) exceeds budget (${budget})"
                    ),
                });
            }
        }

        CapacityValidation {
            valid: errors.is_empty(),
            warnings,
            errors,
        }
    }
}

fn validate_budget(budget: f64) -> Result<()> {
    if !budget.is_finite() || budget < 0.0 {
        return Err(ProviderError::InvalidParams(format!(
            "budget must be a non-negative number, got {budget}"
        )));
    }
    Ok(())
}

fn utilization(cost: f64, budget: f64) -> f64 {
    if budget > 0.0 {
        (cost / budget) * 100.0
    } else {
        0.0
    }
}
