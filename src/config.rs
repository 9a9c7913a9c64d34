use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned for .eml files.
    pub sample_dir: String,
    /// Connecting client IP used for the reverse (PTR) provenance lookup.
    pub source_ip: String,
    /// Sender domains that are always treated as malicious.
    pub blocklist: Vec<String>,
    /// Regex patterns matched against the sender domain, e.g. a lookalike
    /// pattern for a protected brand.
    pub blocklist_patterns: Vec<String>,
    pub spamd: SpamdConfig,
    pub llm: LlmConfig,
    pub routes: RouteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamdConfig {
    pub host: String,
    pub port: u16,
    /// Overall deadline for one connect + write + read exchange.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Key for an OpenAI-compatible endpoint. Falls back to OPENAI_API_KEY.
    pub openai_api_key: Option<String>,
    /// Alternate base URL for OpenAI-compatible providers.
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    /// Gemini key. Falls back to GEMINI_API_KEY. Preferred when both are set.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub clean_dir: String,
    pub quarantine_dir: String,
    pub spam_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_dir: "samples".to_string(),
            source_ip: "203.0.113.1".to_string(),
            blocklist: vec![
                "spam.com".to_string(),
                "spamsite.biz".to_string(),
                "badmailer.test".to_string(),
            ],
            blocklist_patterns: Vec::new(),
            spamd: SpamdConfig {
                host: "127.0.0.1".to_string(),
                port: 783,
                timeout_seconds: 5,
            },
            llm: LlmConfig {
                openai_api_key: None,
                openai_base_url: None,
                openai_model: "gpt-3.5-turbo".to_string(),
                gemini_api_key: None,
                gemini_model: "gemini-1.5-flash".to_string(),
                timeout_seconds: 20,
            },
            routes: RouteConfig {
                clean_dir: "clean".to_string(),
                quarantine_dir: "quarantine".to_string(),
                spam_dir: "spam".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl LlmConfig {
    /// API keys may live in the environment instead of the config file.
    pub fn resolved_openai_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    pub fn resolved_gemini_key(&self) -> Option<String> {
        self.gemini_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.spamd.host, "127.0.0.1");
        assert_eq!(parsed.spamd.port, 783);
        assert_eq!(parsed.blocklist.len(), 3);
        assert_eq!(parsed.llm.timeout_seconds, 20);
        assert_eq!(parsed.routes.spam_dir, "spam");
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = std::env::temp_dir().join("mailsift-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        let path_str = path.to_str().unwrap();

        let mut config = Config::default();
        config.blocklist.push("evil.example".to_string());
        config.to_file(path_str).unwrap();

        let loaded = Config::from_file(path_str).unwrap();
        assert!(loaded.blocklist.contains(&"evil.example".to_string()));

        std::fs::remove_file(&path).ok();
    }
}
