use crate::config::SpamdConfig;
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const PROTOCOL_VERSION: &str = "SPAMC/1.2";

/// Daemon command verb. `Check` returns only the score headers; `Symbols`
/// additionally lists the matched rule names in the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Check,
    Symbols,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Check => "CHECK",
            Verb::Symbols => "SYMBOLS",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpamdResult {
    pub score: f64,
    pub required: f64,
    /// The daemon's own verdict bit. Authoritative even when score/required
    /// could not be parsed out of the response.
    pub is_spam: bool,
    pub rules: Vec<String>,
}

/// Client for one request/response exchange with a spamd-compatible daemon.
///
/// Each call opens its own connection; requests are self-contained and the
/// daemon closes the stream after answering. Retry policy belongs to the
/// caller, not here.
#[derive(Debug, Clone)]
pub struct SpamdClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SpamdClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        SpamdClient {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(config: &SpamdConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Score the message and collect matched rule names in one exchange.
    pub async fn check(&self, raw: &[u8]) -> Result<SpamdResult, ClientError> {
        self.perform(SpamdRequest {
            verb: Verb::Symbols,
            payload: raw,
        })
        .await
    }

    /// Run one exchange under the configured deadline, which covers
    /// connect, write, and read together.
    pub async fn perform(&self, request: SpamdRequest<'_>) -> Result<SpamdResult, ClientError> {
        match tokio::time::timeout(self.timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout),
        }
    }

    async fn exchange(&self, request: SpamdRequest<'_>) -> Result<SpamdResult, ClientError> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ClientError::connection(format!("connect {addr}: {e}")))?;

        stream
            .write_all(&request.encode())
            .await
            .map_err(|e| ClientError::connection(format!("write request: {e}")))?;
        // Half-close so the daemon sees end of input even if it ignores
        // Content-Length.
        stream
            .shutdown()
            .await
            .map_err(|e| ClientError::connection(format!("shutdown write half: {e}")))?;

        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .await
            .map_err(|e| ClientError::connection(format!("read response: {e}")))?;

        parse_response(&response)
    }
}

/// One classification request: a command verb selecting daemon behavior
/// plus the raw message bytes, sent verbatim.
#[derive(Debug, Clone, Copy)]
pub struct SpamdRequest<'a> {
    pub verb: Verb,
    pub payload: &'a [u8],
}

impl SpamdRequest<'_> {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = encode_request(self.verb, self.payload.len()).into_bytes();
        buf.extend_from_slice(self.payload);
        buf
    }
}

/// Request framing: a command line, a Content-Length header matching the
/// payload exactly, and a blank line. The payload follows verbatim.
pub fn encode_request(verb: Verb, content_length: usize) -> String {
    format!(
        "{} {}\r\nContent-Length: {}\r\n\r\n",
        verb.as_str(),
        PROTOCOL_VERSION,
        content_length
    )
}

/// Parse a complete daemon response.
///
/// The status line must carry the EX_OK marker. Headers run up to the first
/// blank line; a response that ends before that blank line is garbled. The
/// `Spam:` header's boolean token is the source of truth; score/required
/// numbers that fail to parse degrade to 0.0 instead of failing the call.
pub fn parse_response(raw: &[u8]) -> Result<SpamdResult, ClientError> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.lines();

    let status = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(ClientError::protocol("empty response from spamd")),
    };
    if !status.contains("EX_OK") {
        return Err(ClientError::protocol(format!("spamd error: {status}")));
    }

    let mut result = SpamdResult::default();
    let mut saw_spam_header = false;
    let mut in_body = false;
    let mut body = String::new();

    for line in lines {
        if in_body {
            body.push_str(line);
            continue;
        }
        if line.is_empty() {
            in_body = true;
            continue;
        }
        if let Some(rest) = line.strip_prefix("Spam:") {
            saw_spam_header = true;
            parse_spam_header(rest, &mut result);
        }
    }

    if !in_body {
        return Err(ClientError::protocol(
            "truncated response: header section never completed",
        ));
    }
    if !saw_spam_header {
        return Err(ClientError::protocol("response missing Spam header"));
    }

    let rules = body.trim();
    if !rules.is_empty() {
        result.rules = rules
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
    }

    Ok(result)
}

/// `Spam: <bool> ; <score> / <required>`
fn parse_spam_header(rest: &str, result: &mut SpamdResult) {
    let mut parts = rest.splitn(2, ';');

    let token = parts.next().unwrap_or("").trim();
    result.is_spam = token.eq_ignore_ascii_case("true") || token.eq_ignore_ascii_case("yes");

    if let Some(numbers) = parts.next() {
        let mut numbers = numbers.splitn(2, '/');
        result.score = numbers
            .next()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        result.required = numbers
            .next()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_encode_request_framing() {
        let header = encode_request(Verb::Symbols, 42);
        assert_eq!(header, "SYMBOLS SPAMC/1.2\r\nContent-Length: 42\r\n\r\n");
        assert!(encode_request(Verb::Check, 0).starts_with("CHECK SPAMC/1.2\r\n"));
    }

    #[test]
    fn test_request_payload_follows_header_verbatim() {
        let request = SpamdRequest {
            verb: Verb::Check,
            payload: b"Subject: hi\r\n\r\nbody",
        };
        let wire = request.encode();
        assert_eq!(
            wire,
            b"CHECK SPAMC/1.2\r\nContent-Length: 19\r\n\r\nSubject: hi\r\n\r\nbody"
        );
    }

    #[test]
    fn test_parse_response_with_rules() {
        let raw = b"SPAMD/1.1 0 EX_OK\r\nSpam: True ; 12.3 / 5.0\r\n\r\nRULE_A,RULE_B";
        let result = parse_response(raw).unwrap();
        assert!(result.is_spam);
        assert_eq!(result.score, 12.3);
        assert_eq!(result.required, 5.0);
        assert_eq!(result.rules, vec!["RULE_A", "RULE_B"]);
    }

    #[test]
    fn test_parse_response_empty_body_means_no_rules() {
        let raw = b"SPAMD/1.1 0 EX_OK\r\nSpam: False ; 0.2 / 5.0\r\n\r\n";
        let result = parse_response(raw).unwrap();
        assert!(!result.is_spam);
        assert!(result.rules.is_empty());
    }

    #[test]
    fn test_parse_response_rejects_unsuccessful_status() {
        let raw = b"SPAMD/1.1 76 EX_PROTOCOL\r\n\r\n";
        let err = parse_response(raw).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(err.to_string().contains("EX_PROTOCOL"));
    }

    #[test]
    fn test_parse_response_rejects_empty_input() {
        assert!(matches!(
            parse_response(b"").unwrap_err(),
            ClientError::Protocol(_)
        ));
    }

    #[test]
    fn test_parse_response_rejects_truncated_headers() {
        // No blank line ever arrives, so the header section is incomplete.
        let raw = b"SPAMD/1.1 0 EX_OK\r\nSpam: True ; 1.0 / 5.0";
        assert!(matches!(
            parse_response(raw).unwrap_err(),
            ClientError::Protocol(_)
        ));
    }

    #[test]
    fn test_parse_response_garbled_numbers_keep_verdict_bit() {
        let raw = b"SPAMD/1.1 0 EX_OK\r\nSpam: Yes ; twelve / 5..0\r\n\r\n";
        let result = parse_response(raw).unwrap();
        assert!(result.is_spam);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.required, 0.0);
    }

    #[test]
    fn test_parse_response_falsy_token() {
        let raw = b"SPAMD/1.1 0 EX_OK\r\nSpam: No ; 1.0 / 5.0\r\n\r\n";
        let result = parse_response(raw).unwrap();
        assert!(!result.is_spam);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn test_check_against_mock_daemon() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            conn.read_to_end(&mut request).await.unwrap();

            let request = String::from_utf8_lossy(&request).to_string();
            assert!(request.starts_with("SYMBOLS SPAMC/1.2\r\n"));
            assert!(request.contains("Content-Length:"));

            conn.write_all(
                b"SPAMD/1.1 0 EX_OK\r\nSpam: True ; 10.5 / 5.0\r\n\r\nVIAGRA,NIGERIAN_PRINCE",
            )
            .await
            .unwrap();
        });

        let client = SpamdClient::new("127.0.0.1", port, Duration::from_secs(5));
        let result = client.check(b"Subject: Test\r\n\r\nBody").await.unwrap();

        assert!(result.is_spam);
        assert_eq!(result.score, 10.5);
        assert_eq!(result.rules, vec!["VIAGRA", "NIGERIAN_PRINCE"]);
    }

    #[tokio::test]
    async fn test_check_times_out_against_silent_daemon() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            // Accept and hold the connection open without answering.
            let (_conn, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = SpamdClient::new("127.0.0.1", port, Duration::from_millis(100));
        let err = client.check(b"payload").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }

    #[tokio::test]
    async fn test_check_reports_connection_failure() {
        // Bind then drop to find a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = SpamdClient::new("127.0.0.1", port, Duration::from_secs(1));
        let err = client.check(b"payload").await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
    }
}
