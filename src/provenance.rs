use crate::message::Message;
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

const PTR_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProvenanceStatus {
    Pass,
    Softfail,
    Fail,
    Neutral,
    #[default]
    None,
}

impl ProvenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceStatus::Pass => "pass",
            ProvenanceStatus::Softfail => "softfail",
            ProvenanceStatus::Fail => "fail",
            ProvenanceStatus::Neutral => "neutral",
            ProvenanceStatus::None => "none",
        }
    }
}

/// Network-provenance evidence: the upstream SPF verdict recorded in the
/// message plus a reverse lookup of the configured source address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceResult {
    pub status: ProvenanceStatus,
    pub raw_evidence: String,
    pub resolved_hostname: Option<String>,
    pub lookup_error: Option<String>,
}

/// Classify the Received-SPF header and resolve the source IP's PTR name.
/// A failed lookup fills `lookup_error` and leaves `status` untouched.
pub async fn gather(message: &Message, source_ip: &str) -> ProvenanceResult {
    let (status, raw_evidence) = classify_spf(message.header("Received-SPF"));
    let mut result = ProvenanceResult {
        status,
        raw_evidence,
        resolved_hostname: None,
        lookup_error: None,
    };

    match source_ip.parse::<IpAddr>() {
        Err(_) => {
            result.lookup_error = Some(format!("invalid source IP: {source_ip}"));
        }
        Ok(ip) => match resolve_ptr(ip).await {
            Ok(hostname) => result.resolved_hostname = hostname,
            Err(e) => result.lookup_error = Some(e),
        },
    }

    result
}

/// `pass` is matched before `softfail` and `softfail` before `fail`: the
/// token `fail` is a substring of `softfail`.
pub fn classify_spf(header: Option<&str>) -> (ProvenanceStatus, String) {
    let header = match header {
        Some(h) => h,
        None => return (ProvenanceStatus::None, "no Received-SPF header".to_string()),
    };

    let lower = header.to_lowercase();
    let status = if lower.contains("pass") {
        ProvenanceStatus::Pass
    } else if lower.contains("softfail") {
        ProvenanceStatus::Softfail
    } else if lower.contains("fail") {
        ProvenanceStatus::Fail
    } else {
        ProvenanceStatus::Neutral
    };

    (status, header.to_string())
}

async fn resolve_ptr(ip: IpAddr) -> Result<Option<String>, String> {
    let resolver =
        TokioAsyncResolver::tokio_from_system_conf().map_err(|e| e.to_string())?;

    let lookup = tokio::time::timeout(PTR_LOOKUP_TIMEOUT, resolver.reverse_lookup(ip));
    match lookup.await {
        Ok(Ok(response)) => Ok(response
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())),
        Ok(Err(e)) => {
            log::debug!("PTR lookup failed for {ip}: {e}");
            Err(e.to_string())
        }
        Err(_) => {
            log::debug!("PTR lookup timed out for {ip}");
            Err("PTR lookup timed out".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::path::Path;

    #[test]
    fn test_classify_spf_tokens() {
        let (status, _) = classify_spf(Some("pass (sender SPF authorized)"));
        assert_eq!(status, ProvenanceStatus::Pass);

        let (status, _) = classify_spf(Some("softfail (domain discourages use)"));
        assert_eq!(status, ProvenanceStatus::Softfail);

        let (status, _) = classify_spf(Some("fail (not designated sender)"));
        assert_eq!(status, ProvenanceStatus::Fail);

        let (status, _) = classify_spf(Some("temperror while checking"));
        assert_eq!(status, ProvenanceStatus::Neutral);
    }

    #[test]
    fn test_classify_spf_absent_header() {
        let (status, evidence) = classify_spf(None);
        assert_eq!(status, ProvenanceStatus::None);
        assert_eq!(evidence, "no Received-SPF header");
    }

    #[test]
    fn test_softfail_not_misread_as_fail() {
        // "softfail" contains "fail"; ordering must keep them apart.
        let (status, _) = classify_spf(Some("SoftFail: suspicious but tolerated"));
        assert_eq!(status, ProvenanceStatus::Softfail);
    }

    #[tokio::test]
    async fn test_gather_with_invalid_source_ip() {
        let msg = Message::parse(
            "t.eml",
            Path::new("t.eml"),
            b"From: a@b.c\r\nReceived-SPF: fail (nope)\r\n\r\nbody\r\n".to_vec(),
        )
        .unwrap();

        let result = gather(&msg, "not-an-ip").await;
        assert_eq!(result.status, ProvenanceStatus::Fail);
        assert!(result.lookup_error.unwrap().contains("invalid source IP"));
        assert!(result.resolved_hostname.is_none());
    }
}
