use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// The structured object every category-choice call must yield.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChoice {
    pub chosen_category_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Fallback for providers that wrap or decorate their JSON: the first
/// {...} block mentioning chosenCategoryName.
static EMBEDDED_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{[^{}]*"chosenCategoryName"[^{}]*\}"#).unwrap());

/// Recover a `CategoryChoice` from a provider response. Prefers a clean
/// schema-enforced object; falls back to stripping markdown fences and then
/// to regex extraction. Returns None when nothing parseable remains, which
/// the failover layer treats as a provider failure.
pub fn parse_category_choice(raw: &str) -> Option<CategoryChoice> {
    let stripped = strip_code_fences(raw);

    if let Ok(choice) = serde_json::from_str::<CategoryChoice>(stripped.trim()) {
        return Some(choice);
    }

    let block = EMBEDDED_OBJECT.find(&stripped)?;
    serde_json::from_str::<CategoryChoice>(block.as_str()).ok()
}

/// Remove a surrounding markdown code fence (``` or ```json) if present.
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => return trimmed.to_string(),
    };
    without_open
        .trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_json() {
        let raw = r#"{"chosenCategoryName": "Work", "summary": "coding", "reasoning": "editing Rust"}"#;
        let choice = parse_category_choice(raw).unwrap();
        assert_eq!(choice.chosen_category_name, "Work");
        assert_eq!(choice.summary.as_deref(), Some("coding"));
        assert_eq!(choice.reasoning.as_deref(), Some("editing Rust"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"chosenCategoryName\": \"Work\", \"summary\": \"s\", \"reasoning\": \"r\"}\n```";
        let choice = parse_category_choice(raw).unwrap();
        assert_eq!(choice.chosen_category_name, "Work");
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let raw = "Sure! Here is the categorization you asked for:\n\
{\"chosenCategoryName\": \"Distraction\", \"summary\": \"scrolling\", \"reasoning\": \"social feed\"}\n\
Let me know if you need anything else.";
        let choice = parse_category_choice(raw).unwrap();
        assert_eq!(choice.chosen_category_name, "Distraction");
    }

    #[test]
    fn test_missing_optional_fields_default_to_none() {
        let raw = r#"{"chosenCategoryName": "Work"}"#;
        let choice = parse_category_choice(raw).unwrap();
        assert_eq!(choice.summary, None);
        assert_eq!(choice.reasoning, None);
    }

    #[test]
    fn test_garbage_yields_none() {
        assert_eq!(parse_category_choice("I cannot categorize this."), None);
        assert_eq!(parse_category_choice(""), None);
        assert_eq!(parse_category_choice("{\"wrongKey\": 1}"), None);
    }

    #[test]
    fn test_fence_without_language_tag() {
        let raw = "```\n{\"chosenCategoryName\": \"Work\"}\n```";
        assert!(parse_category_choice(raw).is_some());
    }
}
