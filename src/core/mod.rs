mod allocation;
mod alternatives;
mod chart;
mod metrics;
mod session;
mod strategy;
mod types;

pub use allocation::{
    PortfolioAllocationModel, clamp_portfolio_size, dollar_input_to_percentage, format_dollars,
};
pub use alternatives::{AlternativesBreakdownModel, ApplyRejected, BreakdownDialog};
pub use chart::{
    ChartEntry, ColorToken, UNALLOCATED, allocation_chart, alternatives_chart, strategy_chart,
};
pub use metrics::{RiskSummary, gauge_position, risk_label, risk_score, risk_summary};
pub use session::{DollarValue, SelectedStrategy, SessionCharts, SessionSnapshot, WizardSession};
pub use strategy::{
    NamedStrategy, Volatility, catalog, fixed_allocation, fixed_alternatives, strategy,
};
pub use types::{
    AltCategory, AlternativesAllocation, AssetClass, BREAKDOWN_TOLERANCE, DEFAULT_PORTFOLIO_SIZE,
    MAX_PORTFOLIO_SIZE, MIN_PORTFOLIO_SIZE, PORTFOLIO_SIZE_STEP, RiskLabel, StrategyKey,
    TopLevelAllocation, UnknownKey,
};
