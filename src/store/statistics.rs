//! Precomputed statistics store
//!
//! Keyed by year, then by product code or category. Values are stored as
//! precomputed; nothing here aggregates at query time except YoY growth in
//! the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumStats {
    pub total_premium: f64,
    pub average_premium: f64,
    pub new_contracts: u64,
    pub active_contracts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    /// Internal rate of return
    pub irr: f64,
    pub profit_margin: f64,
    pub loss_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub lapse_rate: f64,
    pub claim_frequency: f64,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductYearStats {
    pub product_code: String,
    pub product_name: String,
    pub category: String,
    pub premium: PremiumStats,
    pub financial: FinancialMetrics,
    pub risk: RiskMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryYearStats {
    pub category: String,
    pub product_count: u32,
    pub total_premium: f64,
    pub new_contracts: u64,
    pub average_irr: f64,
    pub average_loss_ratio: f64,
    pub average_lapse_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub year: String,
    pub total_new_contracts: u64,
    pub total_premium: f64,
    pub average_irr: f64,
    pub product_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearStats {
    pub summary: YearSummary,
    #[serde(default)]
    pub products: BTreeMap<String, ProductYearStats>,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryYearStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsStore {
    #[serde(default)]
    years: BTreeMap<String, YearStats>,
}

impl StatisticsStore {
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn year(&self, year: &str) -> Option<&YearStats> {
        self.years.get(year)
    }

    pub fn years(&self) -> impl Iterator<Item = &str> {
        self.years.keys().map(String::as_str)
    }

    pub fn product(&self, year: &str, code: &str) -> Option<&ProductYearStats> {
        self.years.get(year)?.products.get(code)
    }
}
