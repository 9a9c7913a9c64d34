use crate::message::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    Pass,
    Fail,
}

/// Verification outcome for one signing domain. A message carries zero or
/// more of these, one per DKIM-Signature header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub domain: String,
    pub selector: String,
    pub status: AuthStatus,
    pub detail: String,
}

/// Derive per-signature results from the message's DKIM-Signature and
/// Authentication-Results headers.
///
/// Anything short of an attributable dkim=pass (explicit failure,
/// temperror/permerror, or a missing verifier result) is Fail; the decision
/// engine treats every non-pass the same way.
pub fn verify(message: &Message) -> Vec<AuthenticationResult> {
    let auth_results: Vec<String> = message
        .headers_named("Authentication-Results")
        .map(|v| v.to_lowercase())
        .collect();

    message
        .headers_named("DKIM-Signature")
        .map(|signature| {
            let domain = extract_tag(signature, "d").unwrap_or_default();
            let selector = extract_tag(signature, "s").unwrap_or_default();
            let (status, detail) = classify(&domain.to_lowercase(), &auth_results);
            AuthenticationResult {
                domain,
                selector,
                status,
                detail,
            }
        })
        .collect()
}

/// Pull one tag value (e.g. `d=` or `s=`) out of a DKIM-Signature header.
fn extract_tag(signature: &str, tag: &str) -> Option<String> {
    let prefix = format!("{tag}=");
    for part in signature.split(';') {
        if let Some(value) = part.trim().strip_prefix(&prefix) {
            return Some(value.trim().to_string());
        }
    }
    None
}

fn classify(domain: &str, auth_results: &[String]) -> (AuthStatus, String) {
    for results in auth_results {
        for clause in results.split(';') {
            let clause = clause.trim();
            if !clause.contains("dkim=") {
                continue;
            }
            // Attribute the clause to this signature when it names the
            // signing domain, or when it names no domain at all.
            let attributed = if clause.contains("header.d=") {
                !domain.is_empty() && clause.contains(&format!("header.d={domain}"))
            } else {
                true
            };
            if !attributed {
                continue;
            }
            if clause.contains("dkim=pass") {
                return (AuthStatus::Pass, "dkim=pass".to_string());
            }
            return (AuthStatus::Fail, format!("verifier reported: {clause}"));
        }
    }
    (
        AuthStatus::Fail,
        "no verification result for this signature".to_string(),
    )
}
