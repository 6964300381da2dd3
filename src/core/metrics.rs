use serde::Serialize;

use super::types::{RiskLabel, TopLevelAllocation};

const EQUITIES_WEIGHT: f64 = 4.0;
const BONDS_WEIGHT: f64 = 2.0;
const CASH_WEIGHT: f64 = 1.0;
const ALTERNATIVES_WEIGHT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub score: f64,
    pub label: RiskLabel,
    pub gauge_position: f64,
}

/// Weighted risk score of a percentage split, rounded to one decimal.
///
/// Inputs are not validated: an unnormalized split still yields a number.
pub fn risk_score(allocation: &TopLevelAllocation) -> f64 {
    let weighted = allocation.equities * EQUITIES_WEIGHT
        + allocation.bonds * BONDS_WEIGHT
        + allocation.cash * CASH_WEIGHT
        + allocation.alternatives * ALTERNATIVES_WEIGHT;
    round_to_tenth(weighted / 100.0)
}

pub fn risk_label(score: f64) -> RiskLabel {
    if score <= 1.5 {
        RiskLabel::VeryLow
    } else if score <= 2.5 {
        RiskLabel::Low
    } else if score <= 3.5 {
        RiskLabel::Moderate
    } else if score <= 4.5 {
        RiskLabel::High
    } else {
        RiskLabel::VeryHigh
    }
}

pub fn gauge_position(score: f64) -> f64 {
    (((score - 1.0) / 4.0) * 100.0).clamp(0.0, 100.0)
}

pub fn risk_summary(allocation: &TopLevelAllocation) -> RiskSummary {
    let score = risk_score(allocation);
    RiskSummary {
        score,
        label: risk_label(score),
        gauge_position: gauge_position(score),
    }
}

// Rounds on the exact binary value: 3.05 is stored as 3.0499.. and goes
// down, while an exactly representable half (2.25) goes up.
fn round_to_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scaled = value * 10.0;
    let floor = scaled.floor();
    if scaled - floor == 0.5 {
        let residual = value.mul_add(10.0, -scaled);
        let rounded = if residual < 0.0 { floor } else { floor + 1.0 };
        return rounded / 10.0;
    }
    scaled.round() / 10.0
}
