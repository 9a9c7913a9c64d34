use serde::{Deserialize, Serialize};

/// Phrases that indicate an attempt to steer an automated evaluator.
const INJECTION_PHRASES: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous instructions",
    "ignore your instructions",
    "disregard previous",
    "forget your instructions",
    "you are now dan",
    "you are an unrestricted ai",
    "system override",
    "repeat your instructions",
];

/// Portion of invisible characters above which the text counts as obfuscated.
const INVISIBLE_RATIO_LIMIT: f64 = 0.05;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdversarialResult {
    pub is_flagged: bool,
    pub reason: Option<String>,
}

/// Scan message text for evaluator-manipulation attempts: known prompt
/// injection phrases and invisible-character obfuscation.
pub fn scan(text: &str) -> AdversarialResult {
    let lower = text.to_lowercase();
    for phrase in INJECTION_PHRASES {
        if lower.contains(phrase) {
            return AdversarialResult {
                is_flagged: true,
                reason: Some(format!("prompt injection detected: \"{phrase}\"")),
            };
        }
    }

    let mut invisible = 0usize;
    let mut total = 0usize;
    for ch in text.chars() {
        if is_invisible(ch) {
            invisible += 1;
        }
        total += 1;
    }

    if total > 0 {
        let ratio = invisible as f64 / total as f64;
        if ratio > INVISIBLE_RATIO_LIMIT {
            return AdversarialResult {
                is_flagged: true,
                reason: Some(format!(
                    "invisible character obfuscation: {invisible} of {total} characters"
                )),
            };
        }
    }

    AdversarialResult::default()
}

fn is_invisible(ch: char) -> bool {
    // Zero-width and BOM code points are Format characters, not controls.
    matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}')
        || (ch.is_control() && !ch.is_whitespace())
}
