//! Retrieval Function Registry
//!
//! A closed set of read-only, key-parameterized operations over the two
//! stores. The planner chooses functions by name; names are parsed into
//! [`RetrievalFunction`] once, so dispatch is an exhaustive `match`.
//!
//! # Architecture
//!
//! ```text
//! Planner (name + params JSON) → RetrievalFunction::from_str → Registry::execute
//!                                                                  ↓
//!                                            memory_ops / statistics_ops
//!                                                                  ↓
//!                                   RetrievalResult { success, data | error }
//! ```
//!
//! `execute` never fails with an `Err`: missing keys, unknown codes and bad
//! values come back as `success: false` with a named error.

pub mod memory_ops;
pub mod params;
pub mod statistics_ops;

pub use params::Params;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::RetrievalError;
use crate::store::{DataContext, ExplicitMemory, StatisticsStore};

// ============================================================================
// Function catalogue
// ============================================================================

/// Every retrieval operation the planner may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetrievalFunction {
    GetProductsAffectedByAssumption,
    GetProductDesignHistory,
    GetProductAssumptions,
    GetFinancialMetrics,
    GetRiskMetrics,
    GetPremiumStatistics,
    CompareProducts,
    GetYearOverYearGrowth,
    GetYearSummary,
}

/// Which store a function reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    ExplicitMemory,
    Statistics,
}

/// Static description of one function, rendered into the planning prompt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required_keys: &'static [&'static str],
    pub optional_keys: &'static [&'static str],
    pub data_source: DataSource,
}

impl RetrievalFunction {
    pub const ALL: [RetrievalFunction; 9] = [
        Self::GetProductsAffectedByAssumption,
        Self::GetProductDesignHistory,
        Self::GetProductAssumptions,
        Self::GetFinancialMetrics,
        Self::GetRiskMetrics,
        Self::GetPremiumStatistics,
        Self::CompareProducts,
        Self::GetYearOverYearGrowth,
        Self::GetYearSummary,
    ];

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn spec(&self) -> FunctionSpec {
        match self {
            Self::GetProductsAffectedByAssumption => FunctionSpec {
                name: "getProductsAffectedByAssumption",
                description: "Products whose pricing depends on an assumption, with each product's current assumption value and unit. assumptionType is the assumption's category (or its code).",
                required_keys: &["assumptionType"],
                optional_keys: &[],
                data_source: DataSource::ExplicitMemory,
            },
            Self::GetProductDesignHistory => FunctionSpec {
                name: "getProductDesignHistory",
                description: "Ordered design-change history of a product, optionally filtered by designer and by an inclusive date range (YYYY-MM-DD).",
                required_keys: &["productCode"],
                optional_keys: &["designer", "fromDate", "toDate"],
                data_source: DataSource::ExplicitMemory,
            },
            Self::GetProductAssumptions => FunctionSpec {
                name: "getProductAssumptions",
                description: "Assumptions a product depends on, with current values and units.",
                required_keys: &["productCode"],
                optional_keys: &[],
                data_source: DataSource::ExplicitMemory,
            },
            Self::GetFinancialMetrics => FunctionSpec {
                name: "getFinancialMetrics",
                description: "Year-keyed financial metrics (IRR, profitMargin, lossRatio) for one product, one category, or all products. Optional filter: metricType + threshold (decimal, 12% = 0.12) + comparison (above|below).",
                required_keys: &["year"],
                optional_keys: &["productCode", "category", "metricType", "threshold", "comparison"],
                data_source: DataSource::Statistics,
            },
            Self::GetRiskMetrics => FunctionSpec {
                name: "getRiskMetrics",
                description: "Year-keyed risk metrics (lapseRate, claimFrequency, riskScore) for one product, one category, or all products. Same optional threshold filter as getFinancialMetrics.",
                required_keys: &["year"],
                optional_keys: &["productCode", "category", "metricType", "threshold", "comparison"],
                data_source: DataSource::Statistics,
            },
            Self::GetPremiumStatistics => FunctionSpec {
                name: "getPremiumStatistics",
                description: "Year-keyed premium statistics (total/average premium, new and active contracts) for one product, one category, or all products.",
                required_keys: &["year"],
                optional_keys: &["productCode", "category"],
                data_source: DataSource::Statistics,
            },
            Self::CompareProducts => FunctionSpec {
                name: "compareProducts",
                description: "Compare several products for one year on a chosen metric subset (default: IRR, profitMargin, lossRatio).",
                required_keys: &["productCodes", "year"],
                optional_keys: &["metrics"],
                data_source: DataSource::Statistics,
            },
            Self::GetYearOverYearGrowth => FunctionSpec {
                name: "getYearOverYearGrowth",
                description: "Growth between two years: new-contract growth %, premium growth %, and average IRR delta. Year-level unless productCode is given.",
                required_keys: &["baseYear", "compareYear"],
                optional_keys: &["productCode"],
                data_source: DataSource::Statistics,
            },
            Self::GetYearSummary => FunctionSpec {
                name: "getYearSummary",
                description: "Year-level aggregate totals plus per-category aggregates.",
                required_keys: &["year"],
                optional_keys: &[],
                data_source: DataSource::Statistics,
            },
        }
    }
}

impl std::fmt::Display for RetrievalFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RetrievalFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one function call, always JSON-serializable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_params: Option<Vec<String>>,
    pub result_count: usize,
}

impl RetrievalResult {
    pub fn ok(data: Value, result_count: usize) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            required_params: None,
            result_count,
        }
    }

    pub fn failure(error: &RetrievalError, required_params: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            required_params,
            result_count: 0,
        }
    }
}

/// One planned call together with its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedCall {
    #[serde(rename = "functionName")]
    pub function: RetrievalFunction,
    pub parameters: Map<String, Value>,
    pub result: RetrievalResult,
}

/// What an operation hands back before wrapping: data plus item count
pub(crate) type OpOutput = Result<(Value, usize), RetrievalError>;

// ============================================================================
// Registry
// ============================================================================

/// Dispatcher over the two read-only stores
#[derive(Debug, Clone)]
pub struct Registry {
    memory: Arc<ExplicitMemory>,
    statistics: Arc<StatisticsStore>,
}

impl Registry {
    pub fn new(ctx: &DataContext) -> Self {
        Self {
            memory: Arc::clone(&ctx.memory),
            statistics: Arc::clone(&ctx.statistics),
        }
    }

    pub fn catalogue(&self) -> Vec<FunctionSpec> {
        RetrievalFunction::ALL.iter().map(|f| f.spec()).collect()
    }

    /// Run `function` with `params`. Pure: identical params give identical output.
    pub fn execute(&self, function: RetrievalFunction, params: &Map<String, Value>) -> RetrievalResult {
        let spec = function.spec();
        let params = Params::new(params);

        let missing = params.missing(spec.required_keys);
        if !missing.is_empty() {
            let err = RetrievalError::MissingParams { keys: missing };
            return RetrievalResult::failure(
                &err,
                Some(spec.required_keys.iter().map(|k| k.to_string()).collect()),
            );
        }

        let memory = self.memory.as_ref();
        let stats = self.statistics.as_ref();
        let output = match function {
            RetrievalFunction::GetProductsAffectedByAssumption => {
                memory_ops::products_affected_by_assumption(memory, &params)
            }
            RetrievalFunction::GetProductDesignHistory => {
                memory_ops::product_design_history(memory, &params)
            }
            RetrievalFunction::GetProductAssumptions => {
                memory_ops::product_assumptions(memory, &params)
            }
            RetrievalFunction::GetFinancialMetrics => {
                statistics_ops::financial_metrics(stats, &params)
            }
            RetrievalFunction::GetRiskMetrics => statistics_ops::risk_metrics(stats, &params),
            RetrievalFunction::GetPremiumStatistics => {
                statistics_ops::premium_statistics(stats, &params)
            }
            RetrievalFunction::CompareProducts => statistics_ops::compare_products(stats, &params),
            RetrievalFunction::GetYearOverYearGrowth => {
                statistics_ops::year_over_year_growth(stats, &params)
            }
            RetrievalFunction::GetYearSummary => statistics_ops::year_summary(stats, &params),
        };

        match output {
            Ok((data, count)) => {
                tracing::debug!(function = %function, result_count = count, "Retrieval succeeded");
                RetrievalResult::ok(data, count)
            }
            Err(err) => {
                tracing::warn!(function = %function, error = %err, "Retrieval failed");
                RetrievalResult::failure(&err, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn registry() -> Registry {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data");
        Registry::new(&DataContext::load_dir(dir).unwrap())
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_names_round_trip_through_from_str() {
        for function in RetrievalFunction::ALL {
            assert_eq!(function.name().parse::<RetrievalFunction>(), Ok(function));
        }
        assert_eq!(
            "dropTables".parse::<RetrievalFunction>(),
            Err("dropTables".to_string())
        );
    }

    #[test]
    fn test_serde_name_matches_spec_name() {
        for function in RetrievalFunction::ALL {
            assert_eq!(serde_json::to_value(function).unwrap(), json!(function.name()));
        }
    }

    #[test]
    fn test_catalogue_lists_every_function() {
        let catalogue = registry().catalogue();
        assert_eq!(catalogue.len(), RetrievalFunction::ALL.len());
        assert!(catalogue.iter().all(|s| !s.required_keys.is_empty()));
    }

    #[test]
    fn test_missing_required_key_fails_closed() {
        let result = registry().execute(RetrievalFunction::CompareProducts, &params(json!({"year": "2024"})));
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("missing_params"));
        assert_eq!(
            result.required_params,
            Some(vec!["productCodes".to_string(), "year".to_string()])
        );
        assert!(result.error.unwrap().contains("productCodes"));
    }

    #[test]
    fn test_null_and_blank_count_as_missing() {
        let result = registry().execute(
            RetrievalFunction::GetYearSummary,
            &params(json!({"year": null})),
        );
        assert!(!result.success);

        let result = registry().execute(
            RetrievalFunction::GetYearSummary,
            &params(json!({"year": "  "})),
        );
        assert!(!result.success);
    }

    #[test]
    fn test_failure_serializes_without_data() {
        let result = registry().execute(RetrievalFunction::GetYearSummary, &Map::new());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], json!(false));
        assert!(value.get("data").is_none());
        assert_eq!(value["resultCount"], json!(0));
    }
}
