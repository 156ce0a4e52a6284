//! Prompt texts for the four oracle steps

use crate::registry::FunctionSpec;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract entity mentions from business questions about insurance products.

Return the words exactly as the user wrote them. Do NOT translate them into codes and do NOT guess entities that are not mentioned.

ENTITY TYPES:
- assumptions: pricing assumptions (e.g. mortality, lapse rate, discount rate)
- products: product names or nicknames
- categories: product lines (e.g. life, health, annuity)
- years: any year reference as written (e.g. "2024", "FY2023")
- otherTerms: metric names, thresholds, designers, dates and other key words

OUTPUT FORMAT (JSON only, no markdown code blocks):
{
  "assumptions": ["mortality"],
  "products": [],
  "categories": [],
  "years": ["2024"],
  "otherTerms": ["affected"]
}

Use an empty list for a type with no mentions."#;

pub fn extraction_user_prompt(question: &str) -> String {
    format!(
        "Extract entities from this question:\n\n{}\n\nRespond with JSON only.",
        question
    )
}

pub const CONFIRMATION_SYSTEM_PROMPT: &str = r#"You check tentative entity matches.

Each candidate pairs a term from the user's question with a vocabulary entry found by partial text overlap. Decide for each candidate whether the user really meant that entry.

RULES:
1. Confirm only when the question clearly refers to that entry
2. Reject when the overlap is coincidental or the term means something else
3. Decide every candidate; do not add new ones

OUTPUT FORMAT (JSON only, no markdown code blocks):
{
  "decisions": [
    {"code": "P002", "matchedTerm": "term", "confirmed": false, "reason": "'term' refers to a contract term, not the product"}
  ]
}"#;

pub fn confirmation_user_prompt(question: &str, candidates_json: &str) -> String {
    format!(
        "QUESTION:\n{}\n\nCANDIDATES:\n{}\n\nRespond with JSON only.",
        question, candidates_json
    )
}

pub fn planning_system_prompt(catalogue: &[FunctionSpec]) -> String {
    let functions: Vec<String> = catalogue
        .iter()
        .map(|f| {
            format!(
                "  - {}: {}\n    required: [{}]\n    optional: [{}]",
                f.name,
                f.description,
                f.required_keys.join(", "),
                f.optional_keys.join(", ")
            )
        })
        .collect();

    format!(
        r#"You plan data retrieval for business questions about insurance products.

Choose one or more functions from the catalogue and bind their parameters.

AVAILABLE FUNCTIONS:
{}

RULES:
1. Only use functions from AVAILABLE FUNCTIONS
2. Bind codes ONLY from RESOLVED ENTITIES; never invent a product code, assumption code, category or year
3. For getProductsAffectedByAssumption, bind assumptionType to the resolved assumption's category
4. Years are four-digit strings ("2024"); thresholds are decimals (12% = 0.12); comparison is "above" or "below"
5. If a required parameter cannot be bound from RESOLVED ENTITIES or the question, list what is missing in missingInfo and return no calls
6. Output VALID JSON only

OUTPUT FORMAT (JSON only, no markdown code blocks):
{{
  "intent": "Find products affected by the mortality assumption",
  "calls": [
    {{
      "functionName": "getProductsAffectedByAssumption",
      "parameters": {{"assumptionType": "mortality"}},
      "reason": "Question asks which products depend on mortality"
    }}
  ],
  "missingInfo": []
}}"#,
        functions.join("\n")
    )
}

pub fn planning_user_prompt(question: &str, resolved_json: &str) -> String {
    format!(
        "QUESTION:\n{}\n\nRESOLVED ENTITIES:\n{}\n\nRespond with JSON only.",
        question, resolved_json
    )
}

pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You answer business questions about insurance products from retrieved data.

RULES:
1. Cite the concrete figures in RESULTS (values, codes, names, years); avoid generic language
2. Every call in RESULTS with "success": false must be explained as missing or failed data, naming its error; never omit it silently
3. Do not use any figure that is not in RESULTS
4. Rates are decimals in the data (0.135 = 13.5%); growth values are already percentages
5. Answer in the language of the question, in a few short paragraphs"#;

pub fn synthesis_user_prompt(question: &str, plan_json: &str, results_json: &str) -> String {
    format!(
        "QUESTION:\n{}\n\nPLAN:\n{}\n\nRESULTS:\n{}",
        question, plan_json, results_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RetrievalFunction;

    #[test]
    fn test_planning_prompt_lists_catalogue() {
        let catalogue: Vec<FunctionSpec> = RetrievalFunction::ALL.iter().map(|f| f.spec()).collect();
        let prompt = planning_system_prompt(&catalogue);
        for spec in &catalogue {
            assert!(prompt.contains(spec.name));
        }
        assert!(prompt.contains("required: [productCodes, year]"));
        assert!(prompt.contains("\"missingInfo\": []"));
    }
}
