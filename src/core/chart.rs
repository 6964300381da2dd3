use serde::Serialize;

use super::alternatives::AlternativesBreakdownModel;
use super::types::{AltCategory, AlternativesAllocation, AssetClass, TopLevelAllocation};

pub const UNALLOCATED: &str = "Unallocated";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorToken {
    #[serde(rename = "chart-1")]
    Chart1,
    #[serde(rename = "chart-2")]
    Chart2,
    #[serde(rename = "chart-3")]
    Chart3,
    #[serde(rename = "chart-4")]
    Chart4,
    #[serde(rename = "chart-5")]
    Chart5,
    #[serde(rename = "chart-6")]
    Chart6,
    #[serde(rename = "chart-7")]
    Chart7,
    #[serde(rename = "chart-8")]
    Chart8,
    Muted,
}

pub fn asset_class_color(class: AssetClass) -> ColorToken {
    match class {
        AssetClass::Equities => ColorToken::Chart1,
        AssetClass::Bonds => ColorToken::Chart2,
        AssetClass::Cash => ColorToken::Chart3,
        AssetClass::Alternatives => ColorToken::Chart4,
    }
}

pub fn alt_category_color(category: AltCategory) -> ColorToken {
    match category {
        AltCategory::PrivateEquity => ColorToken::Chart1,
        AltCategory::HedgeFunds => ColorToken::Chart2,
        AltCategory::RealEstate => ColorToken::Chart3,
        AltCategory::PrivateCredit => ColorToken::Chart4,
        AltCategory::PrivateDebt => ColorToken::Chart5,
        AltCategory::Collectibles => ColorToken::Chart6,
        AltCategory::Cryptocurrencies => ColorToken::Chart7,
        AltCategory::Commodities => ColorToken::Chart8,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartEntry {
    pub category: &'static str,
    pub value: f64,
    pub color: ColorToken,
}

/// Pie data for the top-level split, padded with an "Unallocated" slice
/// while the total is under 100.
pub fn allocation_chart(allocation: &TopLevelAllocation) -> Vec<ChartEntry> {
    let mut entries: Vec<ChartEntry> = allocation
        .entries()
        .map(|(class, value)| ChartEntry {
            category: class.label(),
            value,
            color: asset_class_color(class),
        })
        .collect();
    let total = allocation.total();
    if total < 100.0 {
        entries.push(ChartEntry {
            category: UNALLOCATED,
            value: 100.0 - total,
            color: ColorToken::Muted,
        });
    }
    entries
}

/// Radar data for a strategy split. No padding: every axis is always drawn.
pub fn strategy_chart(allocation: &TopLevelAllocation) -> Vec<ChartEntry> {
    allocation
        .entries()
        .map(|(class, value)| ChartEntry {
            category: class.label(),
            value,
            color: asset_class_color(class),
        })
        .collect()
}

pub fn alternatives_chart(
    breakdown: &AlternativesAllocation,
    model: &AlternativesBreakdownModel,
) -> Vec<ChartEntry> {
    breakdown
        .entries()
        .filter(|(category, _)| !model.is_hidden(*category))
        .map(|(category, value)| ChartEntry {
            category: category.label(),
            value,
            color: alt_category_color(category),
        })
        .collect()
}
