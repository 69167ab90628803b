// Business services built on top of the provider system

pub mod capacity;

pub use capacity::{
    BoothConfig, BoothDistribution, BudgetCapacity, BudgetParams, CapacityIssue, CapacityService,
    CapacityUsage, CapacityValidation, DistributionParams, EventCapacityLimits,
};
