//! Pure decision engine: folds one message's signal set into a verdict
//! with a reproducible rationale trail. No I/O, no clock, no state.

use crate::adversarial::AdversarialResult;
use crate::auth::{AuthStatus, AuthenticationResult};
use crate::blocklist::BlocklistResult;
use crate::llm::LlmJudgment;
use crate::provenance::{ProvenanceResult, ProvenanceStatus};
use crate::spamd::SpamdResult;
use serde::{Deserialize, Serialize};
use std::fmt;

// Scoring weights, kept exactly as deployed. Each signal's contribution is
// independent and bounded so every point in the final score traces back to
// one reason entry.
pub const BLOCKLIST_WEIGHT: f64 = 10.0;
pub const ADVERSARIAL_WEIGHT: f64 = 10.0;
pub const PROVENANCE_FAIL_WEIGHT: f64 = 2.0;
pub const PROVENANCE_SOFTFAIL_WEIGHT: f64 = 0.5;
pub const AUTH_PASS_BONUS: f64 = 1.0;
pub const AUTH_FAIL_WEIGHT: f64 = 1.0;
pub const CLASSIFIER_SPAM_WEIGHT: f64 = 5.0;
pub const CLASSIFIER_PARTIAL_FACTOR: f64 = 0.5;
pub const LLM_SPAM_WEIGHT: f64 = 4.0;
pub const LLM_CLEAN_BONUS: f64 = 0.5;

pub const SPAM_THRESHOLD: f64 = 5.0;
pub const QUARANTINE_THRESHOLD: f64 = 2.0;
pub const MAX_SCORE: f64 = 10.0;

/// Every check outcome for exactly one message. The optional fields belong
/// to providers that may be unreachable; the rest default to neutral
/// "unknown" values rather than being omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSet {
    pub authentication: Vec<AuthenticationResult>,
    pub provenance: ProvenanceResult,
    pub blocklist: BlocklistResult,
    pub adversarial: AdversarialResult,
    pub classifier: Option<SpamdResult>,
    pub llm: Option<LlmJudgment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Clean,
    Quarantine,
    Spam,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Clean => "CLEAN",
            Status::Quarantine => "QUARANTINE",
            Status::Spam => "SPAM",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMark {
    Pass,
    Fail,
    None,
}

impl fmt::Display for AuthMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMark::Pass => "PASS",
            AuthMark::Fail => "FAIL",
            AuthMark::None => "NONE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainMark {
    Ok,
    Blocked,
}

impl fmt::Display for DomainMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DomainMark::Ok => "OK",
            DomainMark::Blocked => "BLOCKED",
        })
    }
}

/// The final classification for one message. Built exactly once by
/// [`decide`] and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub status: Status,
    /// Clamped to [0, MAX_SCORE].
    pub decision_score: f64,
    pub reasons: Vec<String>,
    pub auth_mark: AuthMark,
    pub domain_mark: DomainMark,
    pub signals: SignalSet,
}

/// Fold a signal set into a verdict. Deterministic: equal input produces
/// identical output, reason ordering included.
///
/// An adversarial flag is a security event, not a scoring input: it forces
/// SPAM at exactly MAX_SCORE no matter what the other signals say. The
/// informational trail is still collected in full for observability.
pub fn decide(signals: SignalSet) -> Verdict {
    let mut score = 0.0;
    let mut reasons: Vec<String> = Vec::new();

    let adversarial_hit = signals.adversarial.is_flagged;
    if adversarial_hit {
        score += ADVERSARIAL_WEIGHT;
        reasons.push(format!(
            "SECURITY ALERT: {}",
            signals
                .adversarial
                .reason
                .as_deref()
                .unwrap_or("adversarial content detected")
        ));
    }

    let blocklist_hit = signals.blocklist.is_listed;
    let domain_mark = if blocklist_hit {
        score += BLOCKLIST_WEIGHT;
        DomainMark::Blocked
    } else {
        DomainMark::Ok
    };

    match signals.provenance.status {
        ProvenanceStatus::Fail => {
            score += PROVENANCE_FAIL_WEIGHT;
            reasons.push("SPF check failed".to_string());
        }
        ProvenanceStatus::Softfail => {
            score += PROVENANCE_SOFTFAIL_WEIGHT;
            reasons.push("SPF softfail".to_string());
        }
        ProvenanceStatus::Pass | ProvenanceStatus::Neutral | ProvenanceStatus::None => {}
    }

    // One passing signature is enough for the bonus; absence of signatures
    // is not penalized.
    let auth_mark = if signals
        .authentication
        .iter()
        .any(|r| r.status == AuthStatus::Pass)
    {
        score -= AUTH_PASS_BONUS;
        AuthMark::Pass
    } else if !signals.authentication.is_empty() {
        score += AUTH_FAIL_WEIGHT;
        reasons.push("DKIM verification failed".to_string());
        AuthMark::Fail
    } else {
        AuthMark::None
    };

    if let Some(classifier) = &signals.classifier {
        if classifier.is_spam {
            let rules = if classifier.rules.is_empty() {
                String::new()
            } else {
                format!(", rules: {}", classifier.rules.join(", "))
            };
            score += CLASSIFIER_SPAM_WEIGHT;
            reasons.push(format!(
                "spamd flagged as spam (score {:.1}{rules})",
                classifier.score
            ));
        } else if classifier.score > 0.0 {
            let partial = classifier.score * CLASSIFIER_PARTIAL_FACTOR;
            score += partial;
            reasons.push(format!(
                "spamd score {:.1} below threshold, partial weight +{partial:.1}",
                classifier.score
            ));
        }
    }

    if let Some(llm) = &signals.llm {
        if llm.spam {
            score += LLM_SPAM_WEIGHT;
            reasons.push(format!(
                "LLM analysis: spam (confidence {:.2})",
                llm.confidence
            ));
        } else {
            score -= LLM_CLEAN_BONUS;
        }
    }

    if score < 0.0 {
        score = 0.0;
    }

    let mut status = if score >= SPAM_THRESHOLD {
        Status::Spam
    } else if score >= QUARANTINE_THRESHOLD {
        Status::Quarantine
    } else {
        Status::Clean
    };

    // Forced states are not overridden by a lower computed score.
    if blocklist_hit {
        status = Status::Spam;
    }
    if adversarial_hit {
        status = Status::Spam;
        score = MAX_SCORE;
    }

    if reasons.is_empty() {
        reasons.push("no negative indicators found".to_string());
    }

    Verdict {
        status,
        decision_score: score,
        reasons,
        auth_mark,
        domain_mark,
        signals,
    }
}
