use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::models::activity::ActivitySnapshot;

pub const PLACEHOLDER: &str = "[REDACTED]";

/// Literal phrases that force whole-text redaction. OCR'd payment and
/// identity forms often carry malformed or line-split digits that the
/// structured patterns miss, so any mention of these is treated as a hit.
const OVERRIDE_PHRASES: [&str; 2] = ["card number", "ssn"];

pub const KEYWORD_OVERRIDE: &str = "KEYWORD_OVERRIDE";

/// Ordered pattern table. Specific matchers run first; the generic
/// 8-17 digit bank-account matcher runs last so it only sees digit runs
/// nothing else claimed.
static PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "CREDIT_CARD",
            // Visa / Mastercard / Discover in 4-4-4-4, Amex in 4-6-5.
            Regex::new(
                r"\b(?:(?:4\d{3}|5[1-5]\d{2}|6(?:011|5\d{2}))[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}|3[47]\d{2}[ -]?\d{6}[ -]?\d{5})\b",
            )
            .unwrap(),
        ),
        (
            "SSN",
            Regex::new(r"\b\d{3}[- ]\d{2}[- ]\d{4}\b").unwrap(),
        ),
        (
            "PHONE",
            Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").unwrap(),
        ),
        (
            "EMAIL",
            Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap(),
        ),
        (
            "STREET_ADDRESS",
            Regex::new(
                r"(?i)\b\d{1,5}\s+(?:[A-Za-z0-9.'\-]+\s+){1,4}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Circle|Cir|Way|Place|Pl)\.?\b",
            )
            .unwrap(),
        ),
        (
            "API_KEY",
            Regex::new(
                r#"(?i)\b(?:sk|pk|rk|ghp|xox[bap])[-_][A-Za-z0-9_\-]{16,}\b|\b(?i:api[_\-]?key|access[_\-]?token|secret)\s*[:=]\s*\S+"#,
            )
            .unwrap(),
        ),
        (
            "PASSWORD_ASSIGNMENT",
            Regex::new(r#"(?i)\b(?:password|passwd|pwd)\s*(?:is|:|=)\s*\S+"#).unwrap(),
        ),
        (
            "BANK_ACCOUNT",
            Regex::new(r"\b\d{8,17}\b").unwrap(),
        ),
    ]
});

/// Caller-tunable knobs. `skip_patterns` exempts named patterns (used by
/// tests, never by production categorization); `additional_patterns` are
/// extra regexes counted under synthetic CUSTOM_<n> keys.
#[derive(Debug, Default)]
pub struct RedactOptions {
    pub skip_patterns: Vec<String>,
    pub additional_patterns: Vec<Regex>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedactionResult {
    pub text: String,
    pub counts: HashMap<String, usize>,
    pub was_redacted: bool,
}

pub fn redact(text: Option<&str>) -> RedactionResult {
    redact_with(text, &RedactOptions::default())
}

pub fn redact_with(text: Option<&str>, options: &RedactOptions) -> RedactionResult {
    let placeholder = options.placeholder.as_deref().unwrap_or(PLACEHOLDER);

    let mut counts: HashMap<String, usize> = PATTERNS
        .iter()
        .map(|(name, _)| (name.to_string(), 0))
        .collect();

    let raw = match text {
        Some(t) => t,
        None => {
            return RedactionResult {
                text: String::new(),
                counts,
                was_redacted: false,
            }
        }
    };

    let mut scrubbed = raw.to_string();
    let mut was_redacted = false;

    for (name, pattern) in PATTERNS.iter() {
        if options.skip_patterns.iter().any(|s| s == name) {
            continue;
        }
        let matches = pattern.find_iter(&scrubbed).count();
        if matches > 0 {
            scrubbed = pattern.replace_all(&scrubbed, placeholder).into_owned();
            counts.insert(name.to_string(), matches);
            was_redacted = true;
        }
    }

    for (i, pattern) in options.additional_patterns.iter().enumerate() {
        let key = format!("CUSTOM_{}", i + 1);
        let matches = pattern.find_iter(&scrubbed).count();
        if matches > 0 {
            scrubbed = pattern.replace_all(&scrubbed, placeholder).into_owned();
            was_redacted = true;
        }
        counts.insert(key, matches);
    }

    // Fail-safe: a keyword hit redacts the entire text no matter what the
    // structured patterns found.
    let lowered = raw.to_lowercase();
    if OVERRIDE_PHRASES.iter().any(|p| lowered.contains(p)) {
        counts.insert(KEYWORD_OVERRIDE.to_string(), 1);
        return RedactionResult {
            text: placeholder.to_string(),
            counts,
            was_redacted: true,
        };
    }

    RedactionResult {
        text: scrubbed,
        counts,
        was_redacted,
    }
}

/// Scrub the `title`, `url` and `content` fields of a snapshot
/// independently. Every field must pass through here before it leaves the
/// process toward an LLM provider.
pub fn redact_activity_details(snapshot: &ActivitySnapshot) -> ActivitySnapshot {
    let mut redacted = snapshot.clone();
    if snapshot.title.is_some() {
        redacted.title = Some(redact(snapshot.title.as_deref()).text);
    }
    if snapshot.url.is_some() {
        redacted.url = Some(redact(snapshot.url.as_deref()).text);
    }
    if snapshot.content.is_some() {
        redacted.content = Some(redact(snapshot.content.as_deref()).text);
    }
    redacted
}
