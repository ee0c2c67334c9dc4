use crate::config::NotetarConfig;
use crate::export::ExportOutcome;
use std::path::PathBuf;

pub mod config;
pub mod export;
pub mod manifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub outcome: Option<ExportOutcome>,
    pub archive_path: Option<PathBuf>,
    pub manifest_json: Option<String>,
    pub config: Option<NotetarConfig>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_outcome(mut self, outcome: ExportOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_archive_path(mut self, path: PathBuf) -> Self {
        self.archive_path = Some(path);
        self
    }

    pub fn with_manifest_json(mut self, json: String) -> Self {
        self.manifest_json = Some(json);
        self
    }

    pub fn with_config(mut self, config: NotetarConfig) -> Self {
        self.config = Some(config);
        self
    }
}
