use anyhow::Context;
use mail_parser::MessageParser;
use std::path::{Path, PathBuf};

/// One parsed inbound email, loaded from a .eml file.
///
/// The raw bytes are kept verbatim for the spamd exchange; everything the
/// signal gatherers need is extracted into plain fields at load time so no
/// borrow of the raw buffer escapes this module.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub id: String,
    pub path: PathBuf,
    pub raw: Vec<u8>,
    pub subject: Option<String>,
    pub from: Option<String>,
    /// Bare sender address parsed out of the From header.
    pub sender: Option<String>,
    pub body_text: String,
    headers: Vec<(String, String)>,
}

impl Message {
    pub fn parse(id: &str, path: &Path, raw: Vec<u8>) -> anyhow::Result<Self> {
        let parsed = MessageParser::default()
            .parse(&raw)
            .with_context(|| format!("unparseable message: {id}"))?;

        let subject = parsed.subject().map(|s| s.to_string());

        let (from, sender) = match parsed.from().and_then(|a| a.first()) {
            Some(addr) => {
                let address = addr.address.as_deref().map(|a| a.to_string());
                let display = match (addr.name.as_deref(), addr.address.as_deref()) {
                    (Some(name), Some(a)) => Some(format!("{name} <{a}>")),
                    (None, Some(a)) => Some(a.to_string()),
                    _ => None,
                };
                (display, address)
            }
            None => (None, None),
        };

        let body_text = parsed
            .body_text(0)
            .or_else(|| parsed.body_html(0))
            .map(|b| b.trim().to_string())
            .unwrap_or_default();

        // Keep the text-valued headers; structured ones (From, Received)
        // already have dedicated fields or are not consulted by any signal.
        let headers = parsed
            .root_part()
            .headers()
            .iter()
            .filter_map(|h| {
                h.value
                    .as_text()
                    .map(|v| (h.name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Ok(Message {
            id: id.to_string(),
            path: path.to_path_buf(),
            raw,
            subject,
            from,
            sender,
            body_text,
            headers,
        })
    }

    /// Case-insensitive lookup of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header that may repeat, e.g. DKIM-Signature.
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn sender_domain(&self) -> Option<String> {
        domain_of(self.sender.as_deref()?)
    }

    pub fn body_preview(&self, max_chars: usize) -> String {
        if self.body_text.chars().count() <= max_chars {
            return self.body_text.clone();
        }
        let truncated: String = self.body_text.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

pub fn domain_of(address: &str) -> Option<String> {
    address.rsplit_once('@').map(|(_, d)| d.trim().to_lowercase())
}

/// Scan a directory for .eml files. Unparseable files are skipped with a
/// warning so one bad message cannot stall the batch.
pub fn load_dir(dir: &Path) -> anyhow::Result<Vec<Message>> {
    let mut messages = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read sample dir {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.to_lowercase().ends_with(".eml") {
            continue;
        }
        let raw = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        match Message::parse(&name, &path, raw) {
            Ok(message) => messages.push(message),
            Err(e) => log::warn!("Skipping {name}: {e}"),
        }
    }

    messages.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(messages)
}

/// Relocate a screened message into its verdict directory.
pub fn move_to_dir(src: &Path, dest_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("create {}", dest_dir.display()))?;
    let file_name = src
        .file_name()
        .with_context(|| format!("no file name in {}", src.display()))?;
    let dest = dest_dir.join(file_name);
    std::fs::rename(src, &dest)
        .with_context(|| format!("move {} to {}", src.display(), dest.display()))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "From: Alice Example <alice@example.com>\r\n\
                          To: bob@example.org\r\n\
                          Subject: Quarterly report\r\n\
                          Received-SPF: pass (example.com: domain designates sender)\r\n\
                          \r\n\
                          Please find the report attached.\r\n";

    #[test]
    fn test_parse_basic_message() {
        let msg =
            Message::parse("a.eml", Path::new("a.eml"), SAMPLE.as_bytes().to_vec()).unwrap();

        assert_eq!(msg.subject.as_deref(), Some("Quarterly report"));
        assert_eq!(msg.sender.as_deref(), Some("alice@example.com"));
        assert_eq!(msg.sender_domain().as_deref(), Some("example.com"));
        assert!(msg.body_text.contains("report attached"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg =
            Message::parse("a.eml", Path::new("a.eml"), SAMPLE.as_bytes().to_vec()).unwrap();
        assert!(msg.header("received-spf").unwrap().contains("pass"));
        assert!(msg.header("RECEIVED-SPF").is_some());
        assert!(msg.header("x-missing").is_none());
    }

    #[test]
    fn test_domain_of_handles_malformed_addresses() {
        assert_eq!(domain_of("user@Example.COM").as_deref(), Some("example.com"));
        assert_eq!(domain_of("no-at-sign"), None);
    }

    #[test]
    fn test_body_preview_truncates_on_char_boundary() {
        let mut msg = Message::default();
        msg.body_text = "héllo wörld".to_string();
        let preview = msg.body_preview(5);
        assert_eq!(preview, "héllo…");
    }
}
