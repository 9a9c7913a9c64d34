use crate::message::domain_of;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlocklistResult {
    pub sender_domain: String,
    pub is_listed: bool,
    pub reason: String,
}

/// Match the sender's domain against the configured blocklist: exact
/// entries first, then regex patterns. Malformed or missing sender
/// addresses are reported not-listed; absence of a parseable domain is not
/// itself evidence of spam.
pub fn check(sender: Option<&str>, blocklist: &[String], patterns: &[String]) -> BlocklistResult {
    let sender = match sender {
        Some(s) if !s.trim().is_empty() => s.trim(),
        _ => {
            return BlocklistResult {
                sender_domain: String::new(),
                is_listed: false,
                reason: "no sender address".to_string(),
            }
        }
    };

    let domain = match domain_of(sender) {
        Some(d) if !d.is_empty() => d,
        _ => {
            return BlocklistResult {
                sender_domain: sender.to_lowercase(),
                is_listed: false,
                reason: "invalid sender address".to_string(),
            }
        }
    };

    for entry in blocklist {
        if domain == entry.trim().to_lowercase() {
            return BlocklistResult {
                sender_domain: domain,
                is_listed: true,
                reason: "sender domain in blocklist".to_string(),
            };
        }
    }

    for pattern in patterns {
        match Regex::new(pattern) {
            Ok(regex) => {
                if regex.is_match(&domain) {
                    return BlocklistResult {
                        sender_domain: domain,
                        is_listed: true,
                        reason: format!("sender domain matches blocklist pattern '{pattern}'"),
                    };
                }
            }
            Err(e) => log::warn!("Invalid blocklist pattern '{pattern}': {e}"),
        }
    }

    BlocklistResult {
        sender_domain: domain,
        is_listed: false,
        reason: "not in blocklist".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Vec<String> {
        vec!["spam.com".to_string(), "BadMailer.Test".to_string()]
    }

    #[test]
    fn test_listed_domain() {
        let result = check(Some("promo@spam.com"), &list(), &[]);
        assert!(result.is_listed);
        assert_eq!(result.sender_domain, "spam.com");
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let result = check(Some("x@badmailer.test"), &list(), &[]);
        assert!(result.is_listed);
    }

    #[test]
    fn test_pattern_match() {
        let patterns = vec![r"^paypa1\.".to_string()];
        let result = check(Some("billing@paypa1.example"), &list(), &patterns);
        assert!(result.is_listed);
        assert!(result.reason.contains("pattern"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let patterns = vec!["(unclosed".to_string()];
        let result = check(Some("alice@example.com"), &list(), &patterns);
        assert!(!result.is_listed);
    }

    #[test]
    fn test_clean_domain() {
        let result = check(Some("alice@example.com"), &list(), &[]);
        assert!(!result.is_listed);
        assert_eq!(result.reason, "not in blocklist");
    }

    #[test]
    fn test_malformed_sender_not_listed() {
        let result = check(Some("no-at-sign"), &list(), &[]);
        assert!(!result.is_listed);
        assert_eq!(result.reason, "invalid sender address");
    }

    #[test]
    fn test_missing_sender_not_listed() {
        let result = check(None, &list(), &[]);
        assert!(!result.is_listed);
        assert_eq!(result.reason, "no sender address");
    }
}
