pub mod adversarial;
pub mod auth;
pub mod blocklist;
pub mod config;
pub mod decision;
pub mod error;
pub mod llm;
pub mod message;
pub mod provenance;
pub mod screener;
pub mod spamd;

pub use config::Config;
pub use decision::{decide, SignalSet, Status, Verdict};
pub use error::ClientError;
pub use message::Message;
pub use screener::Screener;
pub use spamd::{SpamdClient, SpamdRequest, SpamdResult, Verb};
