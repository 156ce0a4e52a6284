//! Explicit memory: relationship store
//!
//! Assumption records, and per product the assumptions it depends on
//! (with current value/unit) plus its ordered design-change history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumptionRecord {
    pub code: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

/// A product's dependency on one assumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumptionLink {
    pub code: String,
    pub current_value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignChange {
    pub designer: String,
    pub date: NaiveDate,
    pub change: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub code: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub assumptions: Vec<AssumptionLink>,
    #[serde(default)]
    pub design_history: Vec<DesignChange>,
}

/// Product affected by an assumption, with that assumption's current value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedProduct {
    pub product_code: String,
    pub product_name: String,
    pub category: String,
    pub assumption_code: String,
    pub current_value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplicitMemory {
    #[serde(default)]
    assumptions: BTreeMap<String, AssumptionRecord>,
    #[serde(default)]
    products: BTreeMap<String, ProductRecord>,
}

impl ExplicitMemory {
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let mut memory: Self = serde_json::from_str(content)?;
        for product in memory.products.values_mut() {
            product.design_history.sort_by(|a, b| a.date.cmp(&b.date));
        }
        Ok(memory)
    }

    pub fn assumption(&self, code: &str) -> Option<&AssumptionRecord> {
        self.assumptions.get(code)
    }

    pub fn product(&self, code: &str) -> Option<&ProductRecord> {
        self.products.get(code)
    }

    /// Assumption codes whose category equals `assumption_type`, or the code
    /// itself when `assumption_type` names an assumption directly
    pub fn assumption_codes_for_type(&self, assumption_type: &str) -> Vec<String> {
        if let Some(record) = self.assumptions.get(assumption_type) {
            return vec![record.code.clone()];
        }
        self.assumptions
            .values()
            .filter(|a| a.category.eq_ignore_ascii_case(assumption_type))
            .map(|a| a.code.clone())
            .collect()
    }

    /// Products whose assumption list contains any of `codes`, in code order
    pub fn products_affected_by(&self, codes: &[String]) -> Vec<AffectedProduct> {
        self.products
            .values()
            .flat_map(move |product| {
                product
                    .assumptions
                    .iter()
                    .filter(move |link| codes.contains(&link.code))
                    .map(move |link| AffectedProduct {
                        product_code: product.code.clone(),
                        product_name: product.name.clone(),
                        category: product.category.clone(),
                        assumption_code: link.code.clone(),
                        current_value: link.current_value,
                        unit: link.unit.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "assumptions": {
            "C51": {"code": "C51", "name": "Mortality Rate", "category": "mortality"},
            "C52": {"code": "C52", "name": "Morbidity Rate", "category": "morbidity"}
        },
        "products": {
            "P002": {"code": "P002", "name": "Term", "category": "life",
                     "assumptions": [{"code": "C51", "currentValue": 0.0009, "unit": "rate"}],
                     "designHistory": [
                        {"designer": "Park", "date": "2024-05-10", "change": "later"},
                        {"designer": "Park", "date": "2021-11-02", "change": "first"}
                     ]},
            "P003": {"code": "P003", "name": "CI", "category": "health",
                     "assumptions": [{"code": "C52", "currentValue": 0.0034, "unit": "rate"}]}
        }
    }"#;

    #[test]
    fn test_history_sorted_on_load() {
        let memory = ExplicitMemory::from_json_str(SAMPLE).unwrap();
        let history = &memory.product("P002").unwrap().design_history;
        assert_eq!(history[0].change, "first");
        assert_eq!(history[1].change, "later");
    }

    #[test]
    fn test_type_resolves_by_category_or_code() {
        let memory = ExplicitMemory::from_json_str(SAMPLE).unwrap();
        assert_eq!(memory.assumption_codes_for_type("mortality"), vec!["C51"]);
        assert_eq!(memory.assumption_codes_for_type("C52"), vec!["C52"]);
        assert!(memory.assumption_codes_for_type("expense").is_empty());
    }

    #[test]
    fn test_products_affected() {
        let memory = ExplicitMemory::from_json_str(SAMPLE).unwrap();
        let affected = memory.products_affected_by(&["C51".to_string()]);
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].product_code, "P002");
        assert_eq!(affected[0].current_value, 0.0009);
    }
}
