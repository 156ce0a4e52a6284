//! Text normalization for vocabulary matching
//!
//! Case-fold and drop every whitespace character. Punctuation is kept, so
//! "WL+" and "wl +" normalize to the same key but "WL" does not.

/// Normalize a term or candidate name for comparison.
///
/// # Examples
///
/// ```
/// use insight_agent::vocabulary::normalize::normalize_term;
///
/// assert_eq!(normalize_term("Whole Life  Plus"), "wholelifeplus");
/// assert_eq!(normalize_term(" Term 20 "), "term20");
/// ```
pub fn normalize_term(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Extract a four-digit year from free text ("FY2024", "2024년", "in 2023").
pub fn normalize_year(s: &str) -> Option<String> {
    let digits: Vec<char> = s.chars().collect();
    digits
        .windows(4)
        .enumerate()
        .find(|(i, w)| {
            w.iter().all(|c| c.is_ascii_digit())
                && !(*i > 0 && digits[i - 1].is_ascii_digit())
                && !digits.get(i + 4).is_some_and(|c| c.is_ascii_digit())
        })
        .map(|(_, w)| w.iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_whitespace() {
        assert_eq!(normalize_term("Mortality Rate"), "mortalityrate");
        assert_eq!(normalize_term("MORTALITY\trate"), "mortalityrate");
        assert_eq!(normalize_term("WL+"), "wl+");
    }

    #[test]
    fn test_normalize_non_ascii() {
        assert_eq!(normalize_term("위험 률"), "위험률");
        assert_eq!(normalize_term("ÉPARGNE Plus"), "épargneplus");
    }

    #[test]
    fn test_normalize_blank() {
        assert_eq!(normalize_term("   "), "");
    }

    #[test]
    fn test_normalize_year() {
        assert_eq!(normalize_year("2024").as_deref(), Some("2024"));
        assert_eq!(normalize_year("FY2023").as_deref(), Some("2023"));
        assert_eq!(normalize_year("2024년").as_deref(), Some("2024"));
        assert_eq!(normalize_year("last year"), None);
        assert_eq!(normalize_year("202"), None);
        assert_eq!(normalize_year("120245"), None);
    }
}
