//! Operations over the precomputed statistics store
//!
//! All year-keyed. Scoping is by `productCode`, by `category`, or neither
//! (every product of the year). Metric names are parsed leniently into
//! [`MetricKey`] so "IRR", "irr" and "returnRate" name the same column.

use serde_json::{json, Map, Value};

use super::{OpOutput, Params};
use crate::error::RetrievalError;
use crate::store::{CategoryYearStats, ProductYearStats, StatisticsStore, YearStats, YearSummary};
use crate::vocabulary::normalize::normalize_year;

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricGroup {
    Financial,
    Risk,
    Premium,
}

/// One numeric column of `ProductYearStats`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey {
    Irr,
    ProfitMargin,
    LossRatio,
    LapseRate,
    ClaimFrequency,
    RiskScore,
    TotalPremium,
    AveragePremium,
    NewContracts,
    ActiveContracts,
}

impl MetricKey {
    pub const FINANCIAL: [MetricKey; 3] = [Self::Irr, Self::ProfitMargin, Self::LossRatio];
    pub const RISK: [MetricKey; 3] = [Self::LapseRate, Self::ClaimFrequency, Self::RiskScore];
    pub const PREMIUM: [MetricKey; 4] = [
        Self::TotalPremium,
        Self::AveragePremium,
        Self::NewContracts,
        Self::ActiveContracts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Irr => "IRR",
            Self::ProfitMargin => "profitMargin",
            Self::LossRatio => "lossRatio",
            Self::LapseRate => "lapseRate",
            Self::ClaimFrequency => "claimFrequency",
            Self::RiskScore => "riskScore",
            Self::TotalPremium => "totalPremium",
            Self::AveragePremium => "averagePremium",
            Self::NewContracts => "newContracts",
            Self::ActiveContracts => "activeContracts",
        }
    }

    pub fn group(self) -> MetricGroup {
        match self {
            Self::Irr | Self::ProfitMargin | Self::LossRatio => MetricGroup::Financial,
            Self::LapseRate | Self::ClaimFrequency | Self::RiskScore => MetricGroup::Risk,
            Self::TotalPremium | Self::AveragePremium | Self::NewContracts | Self::ActiveContracts => {
                MetricGroup::Premium
            }
        }
    }

    pub fn value(self, stats: &ProductYearStats) -> f64 {
        match self {
            Self::Irr => stats.financial.irr,
            Self::ProfitMargin => stats.financial.profit_margin,
            Self::LossRatio => stats.financial.loss_ratio,
            Self::LapseRate => stats.risk.lapse_rate,
            Self::ClaimFrequency => stats.risk.claim_frequency,
            Self::RiskScore => stats.risk.risk_score,
            Self::TotalPremium => stats.premium.total_premium,
            Self::AveragePremium => stats.premium.average_premium,
            Self::NewContracts => stats.premium.new_contracts as f64,
            Self::ActiveContracts => stats.premium.active_contracts as f64,
        }
    }

    /// Case, separator and synonym tolerant
    pub fn parse(raw: &str) -> Result<Self, RetrievalError> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        let metric = match key.as_str() {
            "irr" | "returnrate" | "rateofreturn" | "internalrateofreturn" => Self::Irr,
            "profitmargin" | "margin" => Self::ProfitMargin,
            "lossratio" => Self::LossRatio,
            "lapserate" | "lapse" | "surrenderrate" => Self::LapseRate,
            "claimfrequency" | "claimrate" => Self::ClaimFrequency,
            "riskscore" => Self::RiskScore,
            "totalpremium" | "premium" | "premiumcollected" => Self::TotalPremium,
            "averagepremium" => Self::AveragePremium,
            "newcontracts" | "contracts" | "contractcount" => Self::NewContracts,
            "activecontracts" => Self::ActiveContracts,
            _ => return Err(RetrievalError::UnknownMetric(raw.to_string())),
        };
        Ok(metric)
    }

    fn parse_in(raw: &str, group: MetricGroup) -> Result<Self, RetrievalError> {
        let metric = Self::parse(raw)?;
        if metric.group() != group {
            return Err(RetrievalError::UnknownMetric(raw.to_string()));
        }
        Ok(metric)
    }

    fn of_group(group: MetricGroup) -> &'static [MetricKey] {
        match group {
            MetricGroup::Financial => &Self::FINANCIAL,
            MetricGroup::Risk => &Self::RISK,
            MetricGroup::Premium => &Self::PREMIUM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
}

impl Comparison {
    pub fn parse(raw: &str) -> Result<Self, RetrievalError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "above" | "gt" | ">" | "greater" | "over" => Ok(Self::Above),
            "below" | "lt" | "<" | "less" | "under" => Ok(Self::Below),
            other => Err(RetrievalError::InvalidParam {
                key: "comparison".to_string(),
                reason: format!("'{}' is not 'above' or 'below'", other),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }

    /// Strict in both directions
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Above => value > threshold,
            Self::Below => value < threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ThresholdFilter {
    metric: MetricKey,
    threshold: f64,
    comparison: Comparison,
}

impl ThresholdFilter {
    fn keeps(&self, stats: &ProductYearStats) -> bool {
        self.comparison.holds(self.metric.value(stats), self.threshold)
    }

    fn to_json(self) -> Value {
        json!({
            "metricType": self.metric.name(),
            "threshold": self.threshold,
            "comparison": self.comparison.as_str(),
        })
    }
}

/// `metricType` alone projects; with `threshold` and `comparison` it filters.
fn read_filter(
    params: &Params,
    group: MetricGroup,
) -> Result<(Option<MetricKey>, Option<ThresholdFilter>), RetrievalError> {
    let metric = params
        .opt_str("metricType")?
        .map(|m| MetricKey::parse_in(&m, group))
        .transpose()?;
    let threshold = params.opt_f64("threshold")?;
    let comparison = params
        .opt_str("comparison")?
        .map(|c| Comparison::parse(&c))
        .transpose()?;

    if threshold.is_none() && comparison.is_none() {
        return Ok((metric, None));
    }

    match (metric, threshold, comparison) {
        (Some(metric), Some(threshold), Some(comparison)) => {
            if !threshold.is_finite() {
                return Err(RetrievalError::InvalidParam {
                    key: "threshold".to_string(),
                    reason: "must be a finite number".to_string(),
                });
            }
            Ok((
                Some(metric),
                Some(ThresholdFilter {
                    metric,
                    threshold,
                    comparison,
                }),
            ))
        }
        _ => {
            let missing = [
                ("metricType", metric.is_none()),
                ("threshold", threshold.is_none()),
                ("comparison", comparison.is_none()),
            ]
            .into_iter()
            .filter(|(_, absent)| *absent)
            .map(|(key, _)| key.to_string())
            .collect();
            Err(RetrievalError::IncompleteFilter { missing })
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

fn year_stats<'s>(
    store: &'s StatisticsStore,
    params: &Params,
    key: &str,
) -> Result<(String, &'s YearStats), RetrievalError> {
    let raw = params.str(key)?;
    let year = normalize_year(&raw).unwrap_or(raw);
    let stats = store
        .year(&year)
        .ok_or_else(|| RetrievalError::UnknownYear(year.clone()))?;
    Ok((year, stats))
}

struct Scope<'s> {
    year: String,
    stats: &'s YearStats,
    product_code: Option<String>,
    category: Option<&'s CategoryYearStats>,
}

impl<'s> Scope<'s> {
    fn read(store: &'s StatisticsStore, params: &Params) -> Result<Self, RetrievalError> {
        let (year, stats) = year_stats(store, params, "year")?;

        let product_code = params.opt_str("productCode")?;
        if let Some(code) = &product_code {
            if !stats.products.contains_key(code) {
                return Err(RetrievalError::UnknownProduct(code.clone()));
            }
        }

        let category = params
            .opt_str("category")?
            .map(|c| {
                stats
                    .categories
                    .get(&c)
                    .or_else(|| {
                        stats
                            .categories
                            .values()
                            .find(|agg| agg.category.eq_ignore_ascii_case(&c))
                    })
                    .ok_or(RetrievalError::UnknownCategory(c))
            })
            .transpose()?;

        Ok(Self {
            year,
            stats,
            product_code,
            category,
        })
    }

    fn products(&self) -> impl Iterator<Item = &'s ProductYearStats> + '_ {
        self.stats.products.values().filter(move |p| {
            self.product_code.as_deref().map_or(true, |c| p.product_code == c)
                && self.category.map_or(true, |agg| p.category == agg.category)
        })
    }

    fn header(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("year".into(), json!(self.year));
        if let Some(code) = &self.product_code {
            out.insert("productCode".into(), json!(code));
        }
        if let Some(agg) = self.category {
            out.insert("category".into(), json!(agg.category));
            out.insert("categoryAggregate".into(), json!(agg));
        }
        out
    }
}

fn product_row(stats: &ProductYearStats, metrics: &[MetricKey]) -> Value {
    let values: Map<String, Value> = metrics
        .iter()
        .map(|m| (m.name().to_string(), json!(m.value(stats))))
        .collect();
    json!({
        "productCode": stats.product_code,
        "productName": stats.product_name,
        "category": stats.category,
        "metrics": values,
    })
}

fn grouped_metrics(store: &StatisticsStore, params: &Params, group: MetricGroup) -> OpOutput {
    let scope = Scope::read(store, params)?;
    let (projection, filter) = read_filter(params, group)?;
    let single;
    let metrics: &[MetricKey] = match projection {
        Some(metric) => {
            single = [metric];
            &single
        }
        None => MetricKey::of_group(group),
    };

    let rows: Vec<Value> = scope
        .products()
        .filter(|p| filter.map_or(true, |f| f.keeps(p)))
        .map(|p| product_row(p, metrics))
        .collect();
    let count = rows.len();

    let mut out = scope.header();
    if let Some(filter) = filter {
        out.insert("filter".into(), filter.to_json());
    }
    out.insert("products".into(), Value::Array(rows));
    Ok((Value::Object(out), count))
}

// ============================================================================
// Operations
// ============================================================================

pub fn financial_metrics(store: &StatisticsStore, params: &Params) -> OpOutput {
    grouped_metrics(store, params, MetricGroup::Financial)
}

pub fn risk_metrics(store: &StatisticsStore, params: &Params) -> OpOutput {
    grouped_metrics(store, params, MetricGroup::Risk)
}

pub fn premium_statistics(store: &StatisticsStore, params: &Params) -> OpOutput {
    let scope = Scope::read(store, params)?;
    let rows: Vec<Value> = scope
        .products()
        .map(|p| product_row(p, &MetricKey::PREMIUM))
        .collect();
    let count = rows.len();

    let mut out = scope.header();
    out.insert("products".into(), Value::Array(rows));
    Ok((Value::Object(out), count))
}

/// Side-by-side values for several products, with highest and lowest per metric
pub fn compare_products(store: &StatisticsStore, params: &Params) -> OpOutput {
    let (year, stats) = year_stats(store, params, "year")?;
    let codes = params.str_list("productCodes")?;
    let metrics = match params.opt_str_list("metrics")? {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|n| MetricKey::parse(n))
            .collect::<Result<Vec<_>, _>>()?,
        _ => MetricKey::FINANCIAL.to_vec(),
    };

    let products = codes
        .iter()
        .map(|code| {
            stats
                .products
                .get(code)
                .ok_or_else(|| RetrievalError::UnknownProduct(code.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let extremes: Map<String, Value> = metrics
        .iter()
        .map(|m| {
            let by_value = |a: &&&ProductYearStats, b: &&&ProductYearStats| {
                m.value(a).total_cmp(&m.value(b))
            };
            let highest = products.iter().max_by(by_value).map(|p| p.product_code.as_str());
            let lowest = products.iter().min_by(by_value).map(|p| p.product_code.as_str());
            (
                m.name().to_string(),
                json!({"highest": highest, "lowest": lowest}),
            )
        })
        .collect();

    let rows: Vec<Value> = products.iter().map(|p| product_row(p, &metrics)).collect();
    let count = rows.len();
    let metric_names: Vec<&str> = metrics.iter().map(|m| m.name()).collect();

    Ok((
        json!({
            "year": year,
            "metrics": metric_names,
            "products": rows,
            "extremes": extremes,
        }),
        count,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GrowthPoint {
    new_contracts: f64,
    premium: f64,
    irr: f64,
}

impl From<&YearSummary> for GrowthPoint {
    fn from(s: &YearSummary) -> Self {
        Self {
            new_contracts: s.total_new_contracts as f64,
            premium: s.total_premium,
            irr: s.average_irr,
        }
    }
}

impl From<&ProductYearStats> for GrowthPoint {
    fn from(p: &ProductYearStats) -> Self {
        Self {
            new_contracts: p.premium.new_contracts as f64,
            premium: p.premium.total_premium,
            irr: p.financial.irr,
        }
    }
}

impl GrowthPoint {
    fn to_json(self) -> Value {
        json!({
            "newContracts": self.new_contracts,
            "premium": self.premium,
            "averageIrr": self.irr,
        })
    }
}

/// Percentage change from `base` to `compare`; undefined when `base` is zero
pub fn growth_percent(base: f64, compare: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some((compare - base) * 100.0 / base)
}

pub fn year_over_year_growth(store: &StatisticsStore, params: &Params) -> OpOutput {
    let (base_year, base_stats) = year_stats(store, params, "baseYear")?;
    let (compare_year, compare_stats) = year_stats(store, params, "compareYear")?;
    let product_code = params.opt_str("productCode")?;

    let (base, compare) = match &product_code {
        Some(code) => {
            let lookup = |stats: &YearStats| {
                stats
                    .products
                    .get(code)
                    .map(GrowthPoint::from)
                    .ok_or_else(|| RetrievalError::UnknownProduct(code.clone()))
            };
            (lookup(base_stats)?, lookup(compare_stats)?)
        }
        None => (
            GrowthPoint::from(&base_stats.summary),
            GrowthPoint::from(&compare_stats.summary),
        ),
    };

    Ok((
        json!({
            "baseYear": base_year,
            "compareYear": compare_year,
            "productCode": product_code,
            "base": base.to_json(),
            "compare": compare.to_json(),
            "contractsGrowth": growth_percent(base.new_contracts, compare.new_contracts),
            "premiumGrowth": growth_percent(base.premium, compare.premium),
            "averageIrrDelta": compare.irr - base.irr,
        }),
        1,
    ))
}

pub fn year_summary(store: &StatisticsStore, params: &Params) -> OpOutput {
    let (year, stats) = year_stats(store, params, "year")?;
    let categories: Vec<&CategoryYearStats> = stats.categories.values().collect();
    let count = categories.len();

    Ok((
        json!({
            "year": year,
            "summary": stats.summary,
            "categories": categories,
        }),
        count,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn store() -> StatisticsStore {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/statistics.json");
        StatisticsStore::from_json_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn codes(data: &Value) -> Vec<String> {
        data["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["productCode"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_metric_parse_is_lenient() {
        assert_eq!(MetricKey::parse("IRR").unwrap(), MetricKey::Irr);
        assert_eq!(MetricKey::parse("return_rate").unwrap(), MetricKey::Irr);
        assert_eq!(MetricKey::parse("Loss Ratio").unwrap(), MetricKey::LossRatio);
        assert!(matches!(
            MetricKey::parse("vibes"),
            Err(RetrievalError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_comparison_is_strict() {
        assert!(Comparison::Above.holds(0.121, 0.12));
        assert!(!Comparison::Above.holds(0.12, 0.12));
        assert!(!Comparison::Below.holds(0.12, 0.12));
    }

    #[test]
    fn test_irr_above_twelve_percent_2024() {
        let m = map(json!({"year": "2024", "metricType": "IRR", "threshold": 0.12, "comparison": "above"}));
        let (data, count) = financial_metrics(&store(), &Params::new(&m)).unwrap();
        assert_eq!(count, 3);
        assert_eq!(codes(&data), vec!["P001", "P005", "P006"]);
        assert_eq!(data["filter"]["metricType"], json!("IRR"));
        assert_eq!(data["products"][0]["metrics"]["IRR"], json!(0.135));
    }

    #[test]
    fn test_filter_below_with_percent_string() {
        let m = map(json!({"year": 2024, "metricType": "irr", "threshold": "10%", "comparison": "below"}));
        let (data, _) = financial_metrics(&store(), &Params::new(&m)).unwrap();
        assert_eq!(codes(&data), vec!["P003", "P004"]);
    }

    #[test]
    fn test_partial_filter_is_incomplete() {
        let m = map(json!({"year": "2024", "threshold": 0.12}));
        let err = financial_metrics(&store(), &Params::new(&m)).unwrap_err();
        assert_eq!(
            err,
            RetrievalError::IncompleteFilter {
                missing: vec!["metricType".into(), "comparison".into()]
            }
        );
    }

    #[test]
    fn test_metric_type_alone_projects() {
        let m = map(json!({"year": "2024", "productCode": "P002", "metricType": "lossRatio"}));
        let (data, count) = financial_metrics(&store(), &Params::new(&m)).unwrap();
        assert_eq!(count, 1);
        let metrics = data["products"][0]["metrics"].as_object().unwrap();
        assert_eq!(metrics.len(), 1);
        assert!(metrics.contains_key("lossRatio"));
    }

    #[test]
    fn test_risk_metric_rejected_by_financial() {
        let m = map(json!({"year": "2024", "metricType": "lapseRate"}));
        let err = financial_metrics(&store(), &Params::new(&m)).unwrap_err();
        assert_eq!(err.kind(), "unknown_metric");

        let (data, count) = risk_metrics(&store(), &Params::new(&m)).unwrap();
        assert_eq!(count, 6);
        assert!(data["products"][0]["metrics"]["lapseRate"].is_number());
    }

    #[test]
    fn test_category_scope_includes_aggregate() {
        let m = map(json!({"year": "2024", "category": "health"}));
        let (data, count) = premium_statistics(&store(), &Params::new(&m)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(codes(&data), vec!["P003", "P004"]);
        assert_eq!(data["categoryAggregate"]["totalPremium"], json!(15600.0));
    }

    #[test]
    fn test_unknown_year_and_category() {
        let m = map(json!({"year": "1999"}));
        assert_eq!(
            financial_metrics(&store(), &Params::new(&m)).unwrap_err(),
            RetrievalError::UnknownYear("1999".into())
        );
        let m = map(json!({"year": "2024", "category": "pets"}));
        assert_eq!(
            premium_statistics(&store(), &Params::new(&m)).unwrap_err(),
            RetrievalError::UnknownCategory("pets".into())
        );
    }

    #[test]
    fn test_compare_products_defaults_to_financial() {
        let m = map(json!({"year": "2024", "productCodes": ["P001", "P005"]}));
        let (data, count) = compare_products(&store(), &Params::new(&m)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(data["metrics"], json!(["IRR", "profitMargin", "lossRatio"]));
        assert_eq!(data["extremes"]["IRR"]["highest"], json!("P005"));
    }

    #[test]
    fn test_compare_products_unknown_code_fails() {
        let m = map(json!({"year": "2024", "productCodes": "P001, P404"}));
        let err = compare_products(&store(), &Params::new(&m)).unwrap_err();
        assert_eq!(err, RetrievalError::UnknownProduct("P404".into()));
    }

    #[test]
    fn test_year_over_year_contract_growth() {
        let m = map(json!({"baseYear": "2023", "compareYear": "2024"}));
        let (data, _) = year_over_year_growth(&store(), &Params::new(&m)).unwrap();
        assert_eq!(data["contractsGrowth"], json!(15.0));
        assert!(data["premiumGrowth"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_swapping_years_inverts_sign() {
        let forward = map(json!({"baseYear": "2023", "compareYear": "2024"}));
        let backward = map(json!({"baseYear": "2024", "compareYear": "2023"}));
        let (f, _) = year_over_year_growth(&store(), &Params::new(&forward)).unwrap();
        let (b, _) = year_over_year_growth(&store(), &Params::new(&backward)).unwrap();
        for key in ["contractsGrowth", "premiumGrowth", "averageIrrDelta"] {
            let f = f[key].as_f64().unwrap();
            let b = b[key].as_f64().unwrap();
            assert!(f > 0.0 && b < 0.0, "{key}: {f} vs {b}");
        }
    }

    #[test]
    fn test_growth_of_zero_base_is_undefined() {
        assert_eq!(growth_percent(0.0, 10.0), None);
        assert_eq!(growth_percent(200.0, 150.0), Some(-25.0));
    }

    #[test]
    fn test_year_summary() {
        let m = map(json!({"year": "FY2023"}));
        let (data, count) = year_summary(&store(), &Params::new(&m)).unwrap();
        assert_eq!(count, 4);
        assert_eq!(data["year"], json!("2023"));
        assert_eq!(data["summary"]["totalNewContracts"], json!(40000));
    }
}
