use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::allocation::PortfolioAllocationModel;
use super::alternatives::{AlternativesBreakdownModel, ApplyRejected, BreakdownDialog};
use super::chart::{ChartEntry, allocation_chart, alternatives_chart, strategy_chart};
use super::metrics::{RiskSummary, risk_summary};
use super::strategy::fixed_allocation;
use super::types::{
    AltCategory, AlternativesAllocation, AssetClass, DEFAULT_PORTFOLIO_SIZE, StrategyKey,
    TopLevelAllocation,
};
use crate::store::{KeyValueStore, StoreError};

pub const KEY_PORTFOLIO_SIZE: &str = "portfolioSize";
pub const KEY_ALLOCATION: &str = "allocation";
pub const KEY_SELECTED_STRATEGY: &str = "selectedStrategy";
pub const KEY_CUSTOM_ALLOCATION: &str = "customAllocation";
pub const KEY_CUSTOM_ALTERNATIVES: &str = "customAlternatives";
pub const KEY_HAS_VISITED: &str = "hasVisited";

/// Strategy choice plus the user's own splits for the advanced strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedStrategy {
    pub key: StrategyKey,
    pub custom_allocation: TopLevelAllocation,
}

impl SelectedStrategy {
    pub fn effective_allocation(&self) -> TopLevelAllocation {
        fixed_allocation(self.key).unwrap_or(self.custom_allocation)
    }
}

/// All wizard state for one user. Mutated only through the methods below;
/// persistence happens at the explicit [`WizardSession::load`] and
/// [`WizardSession::save`] boundaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardSession {
    portfolio: PortfolioAllocationModel,
    strategy: SelectedStrategy,
    alternatives: AlternativesBreakdownModel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub portfolio_size: u64,
    pub allocation: TopLevelAllocation,
    pub total_allocation: f64,
    pub can_continue: bool,
    pub dollar_values: Vec<DollarValue>,
    pub selected_strategy: StrategyKey,
    pub custom_allocation: TopLevelAllocation,
    pub strategy_allocation: TopLevelAllocation,
    pub risk: RiskSummary,
    pub alternatives: AlternativesAllocation,
    pub alternatives_total: f64,
    pub custom_alternatives: Option<AlternativesAllocation>,
    pub hidden_categories: Vec<AltCategory>,
    pub dialog: BreakdownDialog,
    pub can_apply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DollarValue {
    pub category: AssetClass,
    pub percentage: f64,
    pub dollars: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCharts {
    pub allocation: Vec<ChartEntry>,
    pub strategy: Vec<ChartEntry>,
    pub alternatives: Vec<ChartEntry>,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a session from `store`. A store that has never been visited is
    /// seeded with defaults. Missing or unreadable keys fall back to their
    /// defaults individually; only store I/O failures are errors.
    pub fn load(store: &mut dyn KeyValueStore) -> Result<Self, StoreError> {
        if store.get(KEY_HAS_VISITED)?.is_none() {
            debug!("first visit, seeding default session");
            let session = Self::new();
            session.save(store)?;
            return Ok(session);
        }

        let size = match store.get(KEY_PORTFOLIO_SIZE)? {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|err| {
                warn!(key = KEY_PORTFOLIO_SIZE, %raw, %err, "ignoring stored value");
                DEFAULT_PORTFOLIO_SIZE
            }),
            None => DEFAULT_PORTFOLIO_SIZE,
        };
        let allocation = read_json::<TopLevelAllocation>(store, KEY_ALLOCATION)?
            .filter(|allocation| admissible(KEY_ALLOCATION, allocation))
            .unwrap_or(TopLevelAllocation::DEFAULT);
        let key = match store.get(KEY_SELECTED_STRATEGY)? {
            Some(raw) => raw.parse::<StrategyKey>().unwrap_or_else(|err| {
                warn!(key = KEY_SELECTED_STRATEGY, %err, "ignoring stored value");
                StrategyKey::default()
            }),
            None => StrategyKey::default(),
        };
        let custom_allocation = read_json::<TopLevelAllocation>(store, KEY_CUSTOM_ALLOCATION)?
            .filter(|allocation| admissible(KEY_CUSTOM_ALLOCATION, allocation))
            .unwrap_or_default();
        let custom_alternatives: Option<AlternativesAllocation> =
            read_json::<AlternativesAllocation>(store, KEY_CUSTOM_ALTERNATIVES)?.filter(|custom| {
                let committable = custom.is_committable();
                if !committable {
                    warn!(
                        key = KEY_CUSTOM_ALTERNATIVES,
                        total = custom.total(),
                        "ignoring stored value that could not have been applied"
                    );
                }
                committable
            });

        Ok(Self {
            portfolio: PortfolioAllocationModel::from_parts(size, allocation),
            strategy: SelectedStrategy {
                key,
                custom_allocation,
            },
            alternatives: AlternativesBreakdownModel::with_custom(custom_alternatives),
        })
    }

    /// Writes every persisted key in one batch. Dialog drafts and chart
    /// visibility are transient and not saved.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        store.write_batch(&[
            (
                KEY_PORTFOLIO_SIZE,
                Some(self.portfolio.portfolio_size().to_string()),
            ),
            (KEY_ALLOCATION, Some(to_json(self.portfolio.allocation()))),
            (
                KEY_SELECTED_STRATEGY,
                Some(self.strategy.key.as_str().to_string()),
            ),
            (
                KEY_CUSTOM_ALLOCATION,
                Some(to_json(&self.strategy.custom_allocation)),
            ),
            (KEY_CUSTOM_ALTERNATIVES, self.alternatives.custom().map(to_json)),
            (KEY_HAS_VISITED, Some("true".to_string())),
        ])
    }

    pub fn portfolio(&self) -> &PortfolioAllocationModel {
        &self.portfolio
    }

    pub fn strategy(&self) -> &SelectedStrategy {
        &self.strategy
    }

    pub fn alternatives(&self) -> &AlternativesBreakdownModel {
        &self.alternatives
    }

    pub fn set_portfolio_size(&mut self, size: u64) -> bool {
        let changed = self.portfolio.set_portfolio_size(size);
        debug!(
            requested = size,
            applied = self.portfolio.portfolio_size(),
            changed,
            "portfolio size"
        );
        changed
    }

    pub fn update_allocation(&mut self, class: AssetClass, value: f64) -> bool {
        let admitted = self.portfolio.update_allocation(class, value);
        debug!(%class, value, admitted, "allocation update");
        admitted
    }

    pub fn set_allocation_from_dollars(&mut self, class: AssetClass, input: &str) -> bool {
        let admitted = self.portfolio.set_allocation_from_dollars(class, input);
        debug!(%class, input, admitted, "allocation update from dollars");
        admitted
    }

    pub fn select_strategy(&mut self, key: StrategyKey) {
        if self.strategy.key != key {
            debug!(from = %self.strategy.key, to = %key, "strategy selected");
        }
        self.strategy.key = key;
    }

    /// Edits the advanced strategy's own split, under the same admission
    /// rule as the wizard split.
    pub fn update_custom_allocation(&mut self, class: AssetClass, value: f64) -> bool {
        let admitted = self.strategy.custom_allocation.try_set(class, value);
        debug!(%class, value, admitted, "custom allocation update");
        admitted
    }

    pub fn effective_allocation(&self) -> TopLevelAllocation {
        self.strategy.effective_allocation()
    }

    pub fn effective_breakdown(&self) -> AlternativesAllocation {
        self.alternatives.load_for_strategy(self.strategy.key)
    }

    pub fn risk(&self) -> RiskSummary {
        risk_summary(&self.effective_allocation())
    }

    pub fn open_alternatives_dialog(&mut self) {
        self.alternatives.open_dialog();
    }

    pub fn edit_alternatives_draft(&mut self, category: AltCategory, raw: &str) -> bool {
        self.alternatives.edit_draft(category, raw)
    }

    pub fn cancel_alternatives_dialog(&mut self) {
        self.alternatives.cancel_dialog();
    }

    pub fn apply_alternatives_dialog(&mut self) -> Result<AlternativesAllocation, ApplyRejected> {
        let result = self.alternatives.apply_dialog();
        match &result {
            Ok(committed) => debug!(total = committed.total(), "custom alternatives applied"),
            Err(reason) => debug!(%reason, "custom alternatives not applied"),
        }
        result
    }

    pub fn toggle_category_visibility(&mut self, category: AltCategory) -> bool {
        self.alternatives.toggle_category_visibility(category)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let allocation = *self.portfolio.allocation();
        SessionSnapshot {
            portfolio_size: self.portfolio.portfolio_size(),
            allocation,
            total_allocation: self.portfolio.total_allocation(),
            can_continue: self.portfolio.can_continue(),
            dollar_values: AssetClass::ALL
                .iter()
                .map(|&class| DollarValue {
                    category: class,
                    percentage: allocation.get(class),
                    dollars: self.portfolio.to_dollar_value(class),
                })
                .collect(),
            selected_strategy: self.strategy.key,
            custom_allocation: self.strategy.custom_allocation,
            strategy_allocation: self.effective_allocation(),
            risk: self.risk(),
            alternatives: self.effective_breakdown(),
            alternatives_total: self.effective_breakdown().total(),
            custom_alternatives: self.alternatives.custom().copied(),
            hidden_categories: self.alternatives.hidden().collect(),
            dialog: *self.alternatives.dialog(),
            can_apply: self.alternatives.dialog().can_apply(),
        }
    }

    pub fn charts(&self) -> SessionCharts {
        SessionCharts {
            allocation: allocation_chart(self.portfolio.allocation()),
            strategy: strategy_chart(&self.effective_allocation()),
            alternatives: alternatives_chart(&self.effective_breakdown(), &self.alternatives),
        }
    }
}

fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(key, %err, "ignoring stored value");
            Ok(None)
        }
    }
}

fn admissible(key: &str, allocation: &TopLevelAllocation) -> bool {
    let admissible = allocation.is_admissible();
    if !admissible {
        warn!(
            key,
            total = allocation.total(),
            "ignoring stored split outside the admitted range"
        );
    }
    admissible
}

fn to_json<T: Serialize>(value: &T) -> String {
    // Plain structs of f64 fields always serialize.
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
