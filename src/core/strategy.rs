use serde::Serialize;

use super::metrics::{risk_label, risk_score};
use super::types::{AlternativesAllocation, RiskLabel, StrategyKey, TopLevelAllocation};

/// Immutable catalog record for a named strategy.
///
/// `allocation` and `alternatives` are `None` for the advanced strategy, whose
/// splits live in the session instead.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedStrategy {
    pub key: StrategyKey,
    pub title: &'static str,
    pub objective: &'static str,
    pub highlights: &'static [&'static str],
    pub allocation: Option<TopLevelAllocation>,
    pub alternatives: Option<AlternativesAllocation>,
    pub volatility: Option<Volatility>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Volatility {
    pub score: f64,
    pub label: RiskLabel,
}

const DIVERSIFICATION: TopLevelAllocation = TopLevelAllocation::new(35.0, 20.0, 5.0, 40.0);
const INCOME: TopLevelAllocation = TopLevelAllocation::new(20.0, 50.0, 10.0, 20.0);
const GROWTH: TopLevelAllocation = TopLevelAllocation::new(70.0, 10.0, 0.0, 20.0);
const PRESERVATION: TopLevelAllocation = TopLevelAllocation::new(10.0, 40.0, 40.0, 10.0);

// Columns follow AltCategory::ALL: private equity, hedge funds, real estate,
// private credit, private debt, collectibles, crypto, commodities.
const DIVERSIFICATION_ALTS: AlternativesAllocation =
    AlternativesAllocation::from_array([20.0, 15.0, 20.0, 15.0, 10.0, 5.0, 5.0, 10.0]);
const INCOME_ALTS: AlternativesAllocation =
    AlternativesAllocation::from_array([5.0, 10.0, 30.0, 25.0, 20.0, 0.0, 0.0, 10.0]);
const GROWTH_ALTS: AlternativesAllocation =
    AlternativesAllocation::from_array([30.0, 15.0, 10.0, 5.0, 5.0, 10.0, 15.0, 10.0]);
const PRESERVATION_ALTS: AlternativesAllocation =
    AlternativesAllocation::from_array([5.0, 10.0, 30.0, 25.0, 20.0, 5.0, 0.0, 5.0]);

pub fn fixed_allocation(key: StrategyKey) -> Option<TopLevelAllocation> {
    match key {
        StrategyKey::Diversification => Some(DIVERSIFICATION),
        StrategyKey::Income => Some(INCOME),
        StrategyKey::Growth => Some(GROWTH),
        StrategyKey::Preservation => Some(PRESERVATION),
        StrategyKey::Advanced => None,
    }
}

pub fn fixed_alternatives(key: StrategyKey) -> Option<AlternativesAllocation> {
    match key {
        StrategyKey::Diversification => Some(DIVERSIFICATION_ALTS),
        StrategyKey::Income => Some(INCOME_ALTS),
        StrategyKey::Growth => Some(GROWTH_ALTS),
        StrategyKey::Preservation => Some(PRESERVATION_ALTS),
        StrategyKey::Advanced => None,
    }
}

fn describe(key: StrategyKey) -> (&'static str, &'static str, &'static [&'static str]) {
    match key {
        StrategyKey::Diversification => (
            "Diversification",
            "Spread risk across public and private markets to smooth returns over a full cycle.",
            &[
                "Balanced exposure to equities and fixed income",
                "Meaningful allocation to alternatives for lower correlation",
                "Small cash reserve for rebalancing",
            ],
        ),
        StrategyKey::Income => (
            "Income",
            "Generate steady, predictable cash flow while limiting drawdowns.",
            &[
                "Bond-heavy core for coupon income",
                "Real estate and private credit within alternatives",
                "Cash buffer to cover near-term distributions",
            ],
        ),
        StrategyKey::Growth => (
            "Growth",
            "Maximize long-term capital appreciation and accept higher volatility.",
            &[
                "Equity-led allocation",
                "Private equity and venture-style alternatives",
                "Minimal cash drag",
            ],
        ),
        StrategyKey::Preservation => (
            "Preservation",
            "Protect capital and liquidity first, with modest real growth.",
            &[
                "High cash and short-duration bond weighting",
                "Limited equity exposure",
                "Income-oriented alternatives only",
            ],
        ),
        StrategyKey::Advanced => (
            "Advanced",
            "Build your own mix across every asset class and alternatives category.",
            &[
                "Set each asset class directly",
                "Choose your own alternatives breakdown",
                "Risk score updates as you edit",
            ],
        ),
    }
}

pub fn strategy(key: StrategyKey) -> NamedStrategy {
    let (title, objective, highlights) = describe(key);
    let allocation = fixed_allocation(key);
    NamedStrategy {
        key,
        title,
        objective,
        highlights,
        allocation,
        alternatives: fixed_alternatives(key),
        volatility: allocation.map(|allocation| {
            let score = risk_score(&allocation);
            Volatility {
                score,
                label: risk_label(score),
            }
        }),
    }
}

pub fn catalog() -> Vec<NamedStrategy> {
    StrategyKey::ALL.iter().map(|&key| strategy(key)).collect()
}
