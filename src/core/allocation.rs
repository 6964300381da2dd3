use serde::{Deserialize, Serialize};

use super::types::{
    AssetClass, MAX_PORTFOLIO_SIZE, MIN_PORTFOLIO_SIZE, PORTFOLIO_SIZE_STEP, TopLevelAllocation,
};

/// Portfolio size together with its top-level split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAllocationModel {
    portfolio_size: u64,
    allocation: TopLevelAllocation,
}

impl Default for PortfolioAllocationModel {
    fn default() -> Self {
        Self {
            portfolio_size: super::types::DEFAULT_PORTFOLIO_SIZE,
            allocation: TopLevelAllocation::DEFAULT,
        }
    }
}

impl PortfolioAllocationModel {
    /// Restores a persisted pair as-is, apart from clamping the size.
    pub fn from_parts(portfolio_size: u64, allocation: TopLevelAllocation) -> Self {
        Self {
            portfolio_size: clamp_portfolio_size(portfolio_size),
            allocation,
        }
    }

    pub fn portfolio_size(&self) -> u64 {
        self.portfolio_size
    }

    pub fn allocation(&self) -> &TopLevelAllocation {
        &self.allocation
    }

    /// Clamps and applies a new size. Any size change resets the split to
    /// 60/40/0/0; the previous split is never rescaled.
    pub fn set_portfolio_size(&mut self, new_size: u64) -> bool {
        let clamped = clamp_portfolio_size(new_size);
        if clamped == self.portfolio_size {
            return false;
        }
        self.portfolio_size = clamped;
        self.allocation = TopLevelAllocation::DEFAULT;
        true
    }

    pub fn update_allocation(&mut self, class: AssetClass, new_value: f64) -> bool {
        self.allocation.try_set(class, new_value)
    }

    pub fn total_allocation(&self) -> f64 {
        self.allocation.total()
    }

    pub fn can_continue(&self) -> bool {
        self.allocation.is_complete()
    }

    pub fn dollar_amount(&self, class: AssetClass) -> f64 {
        (self.allocation.get(class) / 100.0) * self.portfolio_size as f64
    }

    pub fn to_dollar_value(&self, class: AssetClass) -> String {
        format_dollars(self.dollar_amount(class))
    }

    /// Applies a dollar-typed edit. Unparseable input is ignored and the
    /// parsed percentage still goes through admission control.
    pub fn set_allocation_from_dollars(&mut self, class: AssetClass, input: &str) -> bool {
        match dollar_input_to_percentage(input, self.portfolio_size) {
            Some(percentage) => self.update_allocation(class, percentage),
            None => false,
        }
    }
}

pub fn clamp_portfolio_size(size: u64) -> u64 {
    let clamped = size.clamp(MIN_PORTFOLIO_SIZE, MAX_PORTFOLIO_SIZE);
    let steps = (clamped + PORTFOLIO_SIZE_STEP / 2) / PORTFOLIO_SIZE_STEP;
    (steps * PORTFOLIO_SIZE_STEP).clamp(MIN_PORTFOLIO_SIZE, MAX_PORTFOLIO_SIZE)
}

/// `"$"` followed by the comma-grouped whole-dollar amount.
pub fn format_dollars(amount: f64) -> String {
    let whole = if amount.is_finite() && amount > 0.0 {
        amount.round() as u64
    } else {
        0
    };
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    grouped.push('$');
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Percentage of `portfolio_size` that a typed dollar string represents,
/// rounded to a whole percent and clamped to [0, 100]. `None` when the input
/// is not a number.
pub fn dollar_input_to_percentage(input: &str, portfolio_size: u64) -> Option<f64> {
    if portfolio_size == 0 {
        return None;
    }
    let cleaned: String = input
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let dollars = cleaned.trim().parse::<f64>().ok()?;
    if !dollars.is_finite() {
        return None;
    }
    let percentage = ((dollars / portfolio_size as f64) * 100.0).round();
    Some(percentage.clamp(0.0, 100.0))
}
