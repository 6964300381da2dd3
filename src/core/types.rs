use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MIN_PORTFOLIO_SIZE: u64 = 250_000;
pub const MAX_PORTFOLIO_SIZE: u64 = 10_000_000;
pub const PORTFOLIO_SIZE_STEP: u64 = 10_000;
pub const DEFAULT_PORTFOLIO_SIZE: u64 = 1_000_000;

/// Tolerance for the alternatives breakdown total. The top-level split has
/// none: it must hit 100 exactly.
pub const BREAKDOWN_TOLERANCE: f64 = 0.01;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equities,
    Bonds,
    Cash,
    Alternatives,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Equities,
        AssetClass::Bonds,
        AssetClass::Cash,
        AssetClass::Alternatives,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Equities => "equities",
            AssetClass::Bonds => "bonds",
            AssetClass::Cash => "cash",
            AssetClass::Alternatives => "alternatives",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetClass::Equities => "Equities",
            AssetClass::Bonds => "Bonds",
            AssetClass::Cash => "Cash",
            AssetClass::Alternatives => "Alternatives",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equities" | "equity" | "stocks" => Ok(AssetClass::Equities),
            "bonds" | "fixed-income" => Ok(AssetClass::Bonds),
            "cash" => Ok(AssetClass::Cash),
            "alternatives" | "alts" => Ok(AssetClass::Alternatives),
            _ => Err(UnknownKey::new("asset class", s)),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum AltCategory {
    #[serde(rename = "Private Equity", alias = "private-equity", alias = "privateEquity")]
    PrivateEquity,
    #[serde(rename = "Hedge Funds", alias = "hedge-funds", alias = "hedgeFunds")]
    HedgeFunds,
    #[serde(rename = "Real Estate", alias = "real-estate", alias = "realEstate")]
    RealEstate,
    #[serde(rename = "Private Credit", alias = "private-credit", alias = "privateCredit")]
    PrivateCredit,
    #[serde(rename = "Private Debt", alias = "private-debt", alias = "privateDebt")]
    PrivateDebt,
    #[serde(rename = "Collectibles", alias = "collectibles")]
    Collectibles,
    #[serde(rename = "Cryptocurrencies", alias = "cryptocurrencies", alias = "crypto")]
    Cryptocurrencies,
    #[serde(rename = "Commodities", alias = "commodities")]
    Commodities,
}

impl AltCategory {
    pub const ALL: [AltCategory; 8] = [
        AltCategory::PrivateEquity,
        AltCategory::HedgeFunds,
        AltCategory::RealEstate,
        AltCategory::PrivateCredit,
        AltCategory::PrivateDebt,
        AltCategory::Collectibles,
        AltCategory::Cryptocurrencies,
        AltCategory::Commodities,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AltCategory::PrivateEquity => "Private Equity",
            AltCategory::HedgeFunds => "Hedge Funds",
            AltCategory::RealEstate => "Real Estate",
            AltCategory::PrivateCredit => "Private Credit",
            AltCategory::PrivateDebt => "Private Debt",
            AltCategory::Collectibles => "Collectibles",
            AltCategory::Cryptocurrencies => "Cryptocurrencies",
            AltCategory::Commodities => "Commodities",
        }
    }
}

impl fmt::Display for AltCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AltCategory {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "privateequity" => Ok(AltCategory::PrivateEquity),
            "hedgefunds" => Ok(AltCategory::HedgeFunds),
            "realestate" => Ok(AltCategory::RealEstate),
            "privatecredit" => Ok(AltCategory::PrivateCredit),
            "privatedebt" => Ok(AltCategory::PrivateDebt),
            "collectibles" => Ok(AltCategory::Collectibles),
            "cryptocurrencies" | "crypto" => Ok(AltCategory::Cryptocurrencies),
            "commodities" => Ok(AltCategory::Commodities),
            _ => Err(UnknownKey::new("alternatives category", s)),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKey {
    #[default]
    Diversification,
    Income,
    Growth,
    Preservation,
    #[serde(alias = "custom")]
    Advanced,
}

impl StrategyKey {
    pub const ALL: [StrategyKey; 5] = [
        StrategyKey::Diversification,
        StrategyKey::Income,
        StrategyKey::Growth,
        StrategyKey::Preservation,
        StrategyKey::Advanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKey::Diversification => "diversification",
            StrategyKey::Income => "income",
            StrategyKey::Growth => "growth",
            StrategyKey::Preservation => "preservation",
            StrategyKey::Advanced => "advanced",
        }
    }

    pub fn is_custom(self) -> bool {
        matches!(self, StrategyKey::Advanced)
    }
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diversification" => Ok(StrategyKey::Diversification),
            "income" => Ok(StrategyKey::Income),
            "growth" => Ok(StrategyKey::Growth),
            "preservation" => Ok(StrategyKey::Preservation),
            "advanced" | "custom" => Ok(StrategyKey::Advanced),
            _ => Err(UnknownKey::new("strategy", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownKey {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownKey {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "VERY LOW")]
    VeryLow,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "VERY HIGH")]
    VeryHigh,
}

impl RiskLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLabel::VeryLow => "VERY LOW",
            RiskLabel::Low => "LOW",
            RiskLabel::Moderate => "MODERATE",
            RiskLabel::High => "HIGH",
            RiskLabel::VeryHigh => "VERY HIGH",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-way top-level split, in percent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelAllocation {
    pub equities: f64,
    pub bonds: f64,
    pub cash: f64,
    pub alternatives: f64,
}

impl TopLevelAllocation {
    /// Split applied on first visit and whenever the portfolio size changes.
    pub const DEFAULT: TopLevelAllocation = TopLevelAllocation::new(60.0, 40.0, 0.0, 0.0);

    pub const fn new(equities: f64, bonds: f64, cash: f64, alternatives: f64) -> Self {
        Self {
            equities,
            bonds,
            cash,
            alternatives,
        }
    }

    pub fn get(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::Equities => self.equities,
            AssetClass::Bonds => self.bonds,
            AssetClass::Cash => self.cash,
            AssetClass::Alternatives => self.alternatives,
        }
    }

    fn slot_mut(&mut self, class: AssetClass) -> &mut f64 {
        match class {
            AssetClass::Equities => &mut self.equities,
            AssetClass::Bonds => &mut self.bonds,
            AssetClass::Cash => &mut self.cash,
            AssetClass::Alternatives => &mut self.alternatives,
        }
    }

    pub fn total(&self) -> f64 {
        AssetClass::ALL.iter().map(|&class| self.get(class)).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.total() == 100.0
    }

    /// Whether every value is a finite percentage and the total is at most
    /// 100, i.e. a state `try_set` could have produced.
    pub fn is_admissible(&self) -> bool {
        self.entries().all(|(_, value)| is_percentage(value)) && self.total() <= 100.0
    }

    /// Sets `class` to `value` only if the new total stays within 100.
    /// Returns whether the update was admitted; a rejected update leaves the
    /// split untouched.
    pub fn try_set(&mut self, class: AssetClass, value: f64) -> bool {
        if !is_percentage(value) {
            return false;
        }
        let others: f64 = AssetClass::ALL
            .iter()
            .filter(|&&other| other != class)
            .map(|&other| self.get(other))
            .sum();
        if others + value > 100.0 {
            return false;
        }
        *self.slot_mut(class) = value;
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = (AssetClass, f64)> + '_ {
        AssetClass::ALL.iter().map(move |&class| (class, self.get(class)))
    }
}

/// Eight-way split of the alternatives bucket, in percent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlternativesAllocation {
    #[serde(rename = "Private Equity", default)]
    pub private_equity: f64,
    #[serde(rename = "Hedge Funds", default)]
    pub hedge_funds: f64,
    #[serde(rename = "Real Estate", default)]
    pub real_estate: f64,
    #[serde(rename = "Private Credit", default)]
    pub private_credit: f64,
    #[serde(rename = "Private Debt", default)]
    pub private_debt: f64,
    #[serde(rename = "Collectibles", default)]
    pub collectibles: f64,
    #[serde(rename = "Cryptocurrencies", default)]
    pub cryptocurrencies: f64,
    #[serde(rename = "Commodities", default)]
    pub commodities: f64,
}

impl AlternativesAllocation {
    pub const ZERO: AlternativesAllocation = AlternativesAllocation::from_array([0.0; 8]);

    /// Values in [`AltCategory::ALL`] order.
    pub const fn from_array(values: [f64; 8]) -> Self {
        Self {
            private_equity: values[0],
            hedge_funds: values[1],
            real_estate: values[2],
            private_credit: values[3],
            private_debt: values[4],
            collectibles: values[5],
            cryptocurrencies: values[6],
            commodities: values[7],
        }
    }

    pub fn get(&self, category: AltCategory) -> f64 {
        match category {
            AltCategory::PrivateEquity => self.private_equity,
            AltCategory::HedgeFunds => self.hedge_funds,
            AltCategory::RealEstate => self.real_estate,
            AltCategory::PrivateCredit => self.private_credit,
            AltCategory::PrivateDebt => self.private_debt,
            AltCategory::Collectibles => self.collectibles,
            AltCategory::Cryptocurrencies => self.cryptocurrencies,
            AltCategory::Commodities => self.commodities,
        }
    }

    pub fn set(&mut self, category: AltCategory, value: f64) {
        let slot = match category {
            AltCategory::PrivateEquity => &mut self.private_equity,
            AltCategory::HedgeFunds => &mut self.hedge_funds,
            AltCategory::RealEstate => &mut self.real_estate,
            AltCategory::PrivateCredit => &mut self.private_credit,
            AltCategory::PrivateDebt => &mut self.private_debt,
            AltCategory::Collectibles => &mut self.collectibles,
            AltCategory::Cryptocurrencies => &mut self.cryptocurrencies,
            AltCategory::Commodities => &mut self.commodities,
        };
        *slot = value;
    }

    /// Stores the parsed value of `raw`; anything that does not parse as a
    /// non-negative finite number becomes 0.
    pub fn update_category(&mut self, category: AltCategory, raw: &str) {
        self.set(category, parse_or_zero(raw));
    }

    pub fn total(&self) -> f64 {
        AltCategory::ALL.iter().map(|&category| self.get(category)).sum()
    }

    pub fn is_committable(&self) -> bool {
        self.entries().all(|(_, value)| value.is_finite() && value >= 0.0)
            && (self.total() - 100.0).abs() < BREAKDOWN_TOLERANCE
    }

    pub fn entries(&self) -> impl Iterator<Item = (AltCategory, f64)> + '_ {
        AltCategory::ALL
            .iter()
            .map(move |&category| (category, self.get(category)))
    }
}

fn is_percentage(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

fn parse_or_zero(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}
