//! Operations over explicit memory (assumption and design relationships)

use serde_json::json;

use super::{OpOutput, Params};
use crate::error::RetrievalError;
use crate::store::{DesignChange, ExplicitMemory, ProductRecord};

/// Products whose assumption list contains any assumption of `assumptionType`
pub fn products_affected_by_assumption(memory: &ExplicitMemory, params: &Params) -> OpOutput {
    let assumption_type = params.str("assumptionType")?;
    let codes = memory.assumption_codes_for_type(&assumption_type);
    if codes.is_empty() {
        return Err(RetrievalError::UnknownAssumption(assumption_type));
    }

    let affected = memory.products_affected_by(&codes);
    let assumptions: Vec<_> = codes.iter().filter_map(|c| memory.assumption(c)).collect();
    let count = affected.len();

    Ok((
        json!({
            "assumptionType": assumption_type,
            "assumptions": assumptions,
            "products": affected,
        }),
        count,
    ))
}

/// Design history for one product, filtered by designer and inclusive date range
pub fn product_design_history(memory: &ExplicitMemory, params: &Params) -> OpOutput {
    let product = lookup_product(memory, params)?;
    let designer = params.opt_str("designer")?;
    let from = params.opt_date("fromDate")?;
    let to = params.opt_date("toDate")?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(RetrievalError::InvalidParam {
                key: "fromDate".to_string(),
                reason: format!("{} is after toDate {}", from, to),
            });
        }
    }

    let history: Vec<&DesignChange> = product
        .design_history
        .iter()
        .filter(|c| {
            designer
                .as_deref()
                .map_or(true, |d| c.designer.eq_ignore_ascii_case(d))
        })
        .filter(|c| from.map_or(true, |f| c.date >= f))
        .filter(|c| to.map_or(true, |t| c.date <= t))
        .collect();
    let count = history.len();

    Ok((
        json!({
            "productCode": product.code,
            "productName": product.name,
            "designHistory": history,
        }),
        count,
    ))
}

/// Assumptions one product depends on, with the assumption names joined in
pub fn product_assumptions(memory: &ExplicitMemory, params: &Params) -> OpOutput {
    let product = lookup_product(memory, params)?;

    let assumptions: Vec<_> = product
        .assumptions
        .iter()
        .map(|link| {
            let record = memory.assumption(&link.code);
            json!({
                "code": link.code,
                "name": record.map(|r| r.name.as_str()),
                "category": record.map(|r| r.category.as_str()),
                "currentValue": link.current_value,
                "unit": link.unit,
            })
        })
        .collect();
    let count = assumptions.len();

    Ok((
        json!({
            "productCode": product.code,
            "productName": product.name,
            "assumptions": assumptions,
        }),
        count,
    ))
}

fn lookup_product<'m>(memory: &'m ExplicitMemory, params: &Params) -> Result<&'m ProductRecord, RetrievalError> {
    let code = params.str("productCode")?;
    memory
        .product(&code)
        .ok_or(RetrievalError::UnknownProduct(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};
    use std::path::PathBuf;

    fn memory() -> ExplicitMemory {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/explicit_memory.json");
        ExplicitMemory::from_json_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn product_codes(data: &Value) -> Vec<&str> {
        data["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["productCode"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_mortality_affects_three_products() {
        let m = map(json!({"assumptionType": "mortality"}));
        let (data, count) = products_affected_by_assumption(&memory(), &Params::new(&m)).unwrap();
        assert_eq!(count, 3);
        assert_eq!(product_codes(&data), vec!["P001", "P002", "P004"]);
        assert_eq!(data["products"][0]["currentValue"], json!(0.0012));
    }

    #[test]
    fn test_assumption_code_accepted() {
        let m = map(json!({"assumptionType": "C52"}));
        let (data, _) = products_affected_by_assumption(&memory(), &Params::new(&m)).unwrap();
        assert_eq!(product_codes(&data), vec!["P003", "P004"]);
    }

    #[test]
    fn test_unknown_assumption_type() {
        let m = map(json!({"assumptionType": "weather"}));
        let err = products_affected_by_assumption(&memory(), &Params::new(&m)).unwrap_err();
        assert_eq!(err, RetrievalError::UnknownAssumption("weather".into()));
    }

    #[test]
    fn test_history_filters_by_designer_case_insensitive() {
        let m = map(json!({"productCode": "P001", "designer": "kim"}));
        let (data, count) = product_design_history(&memory(), &Params::new(&m)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(data["designHistory"][0]["date"], json!("2022-03-14"));
    }

    #[test]
    fn test_history_date_range_is_inclusive() {
        let m = map(json!({"productCode": "P001", "fromDate": "2023-07-01", "toDate": "2024-02-20"}));
        let (_, count) = product_design_history(&memory(), &Params::new(&m)).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_history_inverted_range_rejected() {
        let m = map(json!({"productCode": "P001", "fromDate": "2024-01-01", "toDate": "2023-01-01"}));
        let err = product_design_history(&memory(), &Params::new(&m)).unwrap_err();
        assert_eq!(err.kind(), "invalid_param");
    }

    #[test]
    fn test_history_unknown_product() {
        let m = map(json!({"productCode": "P999"}));
        let err = product_design_history(&memory(), &Params::new(&m)).unwrap_err();
        assert_eq!(err, RetrievalError::UnknownProduct("P999".into()));
    }

    #[test]
    fn test_product_assumptions_joins_names() {
        let m = map(json!({"productCode": "P002"}));
        let (data, count) = product_assumptions(&memory(), &Params::new(&m)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(data["assumptions"][0]["name"], json!("Mortality Rate"));
        assert_eq!(data["assumptions"][1]["code"], json!("C31"));
    }
}
