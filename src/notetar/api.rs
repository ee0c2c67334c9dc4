//! # API Facade
//!
//! Thin entry point over the command layer. It:
//! - **Normalizes inputs**: format names and branch ids arrive as strings
//! - **Merges configuration**: `config.json` defaults, then per-call overrides
//! - **Dispatches** to `commands/*.rs` and returns `Result<CmdResult>`
//!
//! It does no terminal I/O. `NotetarApi<S: NoteStore>` runs against
//! `FileStore` in the binary and `InMemoryStore` in tests.

use crate::commands;
use crate::config::NotetarConfig;
use crate::error::Result;
use crate::export::convert::{ContentConverter, DefaultConverter};
use crate::export::ExportFormat;
use crate::model::BranchId;
use crate::store::NoteStore;
use std::path::{Path, PathBuf};

pub struct NotetarApi<S: NoteStore> {
    store: S,
    config_dir: PathBuf,
    converter: Box<dyn ContentConverter>,
}

impl<S: NoteStore> NotetarApi<S> {
    pub fn new(store: S, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            config_dir: config_dir.into(),
            converter: Box::new(DefaultConverter),
        }
    }

    pub fn with_converter(mut self, converter: Box<dyn ContentConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn export(
        &self,
        branch: &str,
        format: Option<&str>,
        gzip: bool,
        output: Option<&Path>,
        out_dir: &Path,
    ) -> Result<commands::CmdResult> {
        let options = self.load_config()?.export_options(parse_format(format)?, gzip);
        commands::export::run(
            &self.store,
            self.converter.as_ref(),
            &BranchId::new(branch),
            &options,
            output,
            out_dir,
        )
    }

    pub fn manifest(&self, branch: &str, format: Option<&str>) -> Result<commands::CmdResult> {
        let options = self.load_config()?.export_options(parse_format(format)?, false);
        commands::manifest::run(&self.store, &BranchId::new(branch), &options)
    }

    pub fn config(&self, action: ConfigAction) -> Result<commands::CmdResult> {
        commands::config::run(&self.config_dir, action)
    }

    fn load_config(&self) -> Result<NotetarConfig> {
        NotetarConfig::load(&self.config_dir)
    }
}

fn parse_format(format: Option<&str>) -> Result<Option<ExportFormat>> {
    format.map(str::parse).transpose()
}

pub use crate::commands::config::ConfigAction;
pub use commands::{CmdMessage, CmdResult, MessageLevel};
