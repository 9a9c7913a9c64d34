use crate::config::Config;
use crate::decision::{self, SignalSet, Status, Verdict};
use crate::llm::{self, LlmJudge, LlmJudgment};
use crate::message::{self, Message};
use crate::spamd::{SpamdClient, SpamdResult};
use crate::{adversarial, auth, blocklist, provenance};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-message orchestration: gathers all trust signals, folds them into a
/// verdict, and routes the file to its destination directory.
pub struct Screener {
    config: Config,
    spamd: SpamdClient,
    llm: Option<Box<dyn LlmJudge>>,
}

impl Screener {
    pub fn new(config: Config) -> Self {
        let spamd = SpamdClient::from_config(&config.spamd);
        let llm = match llm::from_config(&config.llm) {
            Ok(judge) => {
                log::info!("LLM judge enabled ({})", judge.provider());
                Some(judge)
            }
            Err(e) => {
                log::info!("LLM judge disabled: {e}");
                None
            }
        };
        Screener { config, spamd, llm }
    }

    /// Gather every signal for one message and decide. The network-bound
    /// signals run concurrently, each under its own deadline; any failure
    /// degrades to "signal absent" and a verdict is still produced.
    pub async fn screen(&self, message: &Message) -> Verdict {
        let (provenance, classifier, llm) = tokio::join!(
            provenance::gather(message, &self.config.source_ip),
            self.classifier_signal(message),
            self.llm_signal(message),
        );

        let signals = SignalSet {
            authentication: auth::verify(message),
            provenance,
            blocklist: blocklist::check(
                message.sender.as_deref(),
                &self.config.blocklist,
                &self.config.blocklist_patterns,
            ),
            adversarial: adversarial::scan(&String::from_utf8_lossy(&message.raw)),
            classifier,
            llm,
        };

        decision::decide(signals)
    }

    async fn classifier_signal(&self, message: &Message) -> Option<SpamdResult> {
        match self.spamd.check(&message.raw).await {
            Ok(result) => Some(result),
            Err(e) => {
                log::warn!("spamd signal absent for {}: {e}", message.id);
                None
            }
        }
    }

    async fn llm_signal(&self, message: &Message) -> Option<LlmJudgment> {
        let judge = self.llm.as_ref()?;
        let deadline = Duration::from_secs(self.config.llm.timeout_seconds);
        let subject = message.subject.as_deref().unwrap_or("");
        let sender = message.from.as_deref().unwrap_or("");
        let body = message.body_preview(1500);

        match tokio::time::timeout(deadline, judge.judge(subject, sender, &body)).await {
            Ok(Ok(judgment)) => Some(judgment),
            Ok(Err(e)) => {
                log::warn!("LLM signal absent for {}: {e}", message.id);
                None
            }
            Err(_) => {
                log::warn!("LLM signal absent for {}: deadline exceeded", message.id);
                None
            }
        }
    }

    /// Destination directory keyed by verdict status.
    pub fn route(&self, status: Status) -> &Path {
        let dir = match status {
            Status::Spam => &self.config.routes.spam_dir,
            Status::Quarantine => &self.config.routes.quarantine_dir,
            Status::Clean => &self.config.routes.clean_dir,
        };
        Path::new(dir.as_str())
    }

    pub fn dispose(&self, message: &Message, verdict: &Verdict) -> anyhow::Result<PathBuf> {
        message::move_to_dir(&message.path, self.route(verdict.status))
    }
}
