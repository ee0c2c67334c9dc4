//! # Export Pipeline
//!
//! Turns the subtree under a branch into a single tar archive. Three stages,
//! always in this order:
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ Manifest Builder │──▶│ Reference Filter │──▶│ Archive Emitter  │
//! │  (manifest.rs)   │   │   (filter.rs)    │   │    (emit.rs)     │
//! └──────────────────┘   └──────────────────┘   └──────────────────┘
//! ```
//!
//! 1. [`manifest`]: walk the branch graph, dedupe clones, assign names.
//! 2. [`filter`]: drop relations/links to notes that were not exported.
//! 3. [`emit`]: write `!!!meta.json`, then every directory and file.
//!
//! The first two stages run to completion before a single byte is written,
//! so an export either produces a complete archive or nothing at all.
//!
//! ## Empty Exports
//!
//! If the root note itself carries the exclusion label there is nothing to
//! export. That is not an error: [`prepare`] returns `None` and
//! [`ExportOutcome::Empty`] maps to a client error (400) at HTTP-like
//! boundaries.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

pub mod convert;
pub mod emit;
pub mod filter;
pub mod manifest;
pub mod names;

use crate::error::{NotetarError, Result};
use crate::model::BranchId;
use crate::store::NoteStore;
use convert::ContentConverter;
use emit::{ArchiveEmitter, EmitReport, TarSink};
use filter::{filter_references, FilterReport};
use manifest::{Manifest, ManifestBuilder};

pub const DEFAULT_EXCLUDE_LABEL: &str = "excludeFromExport";

/// How text notes are written into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed HTML
    #[default]
    Html,
    /// HTML converted to Markdown
    Markdown,
    /// Stored content, untouched
    Raw,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Raw => "raw",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = NotetarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "raw" => Ok(ExportFormat::Raw),
            other => Err(NotetarError::Api(format!(
                "Unknown export format '{}' (expected html, markdown or raw)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub exclude_label: String,
    pub gzip: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            exclude_label: DEFAULT_EXCLUDE_LABEL.to_string(),
            gzip: false,
        }
    }
}

/// A built and filtered manifest, ready to be streamed.
#[derive(Debug)]
pub struct PreparedExport {
    pub manifest: Manifest,
    pub filter: FilterReport,
    /// Suggested name for the archive file.
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub file_name: String,
    pub gzip: bool,
    pub notes: usize,
    pub filter: FilterReport,
    pub emit: EmitReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The root note is excluded; no archive was produced.
    Empty,
    Archive(ExportSummary),
}

impl ExportOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            ExportOutcome::Empty => 400,
            ExportOutcome::Archive(_) => 200,
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            ExportOutcome::Empty => None,
            ExportOutcome::Archive(summary) if summary.gzip => Some("application/gzip"),
            ExportOutcome::Archive(_) => Some("application/tar"),
        }
    }

    pub fn content_disposition(&self) -> Option<String> {
        match self {
            ExportOutcome::Empty => None,
            ExportOutcome::Archive(summary) => {
                Some(format!("file; filename=\"{}\"", summary.file_name))
            }
        }
    }
}

/// Archive filename for an export rooted at a note shown as `display_title`.
pub fn archive_file_name(display_title: &str, gzip: bool) -> String {
    let base = names::base_file_name(display_title);
    if gzip {
        format!("{}.tar.gz", base)
    } else {
        format!("{}.tar", base)
    }
}

/// Build and filter the manifest. `None` means the root note is excluded.
pub fn prepare<S: NoteStore>(
    store: &S,
    root_branch: &BranchId,
    options: &ExportOptions,
) -> Result<Option<PreparedExport>> {
    let branch = store.get_branch(root_branch)?;
    let Some(mut manifest) =
        ManifestBuilder::new(store, options.format, &options.exclude_label).build(&branch)?
    else {
        return Ok(None);
    };
    let filter = filter_references(&mut manifest.registry);

    let root = manifest.root_meta()?;
    let file_name = archive_file_name(&branch.display_title(&root.title), options.gzip);

    Ok(Some(PreparedExport {
        manifest,
        filter,
        file_name,
    }))
}

/// Stream a prepared export into `writer`.
pub fn write_archive<S, C, W>(
    store: &S,
    converter: &C,
    prepared: &PreparedExport,
    options: &ExportOptions,
    writer: W,
) -> Result<ExportSummary>
where
    S: NoteStore,
    C: ContentConverter + ?Sized,
    W: Write,
{
    let emit = if options.gzip {
        let encoder = GzEncoder::new(writer, Compression::default());
        let mut sink = TarSink::new(encoder);
        let report = ArchiveEmitter::new(store, converter, &mut sink, options.format)
            .emit(&prepared.manifest)?;
        sink.into_inner()?
            .finish()
            .map_err(NotetarError::Io)?
            .flush()
            .map_err(NotetarError::Io)?;
        report
    } else {
        let mut sink = TarSink::new(writer);
        let report = ArchiveEmitter::new(store, converter, &mut sink, options.format)
            .emit(&prepared.manifest)?;
        sink.into_inner()?.flush().map_err(NotetarError::Io)?;
        report
    };

    Ok(ExportSummary {
        file_name: prepared.file_name.clone(),
        gzip: options.gzip,
        notes: prepared.manifest.registry.len(),
        filter: prepared.filter,
        emit,
    })
}

/// Full export: prepare, then stream into `writer` unless empty.
pub fn export_to_writer<S, C, W>(
    store: &S,
    converter: &C,
    root_branch: &BranchId,
    options: &ExportOptions,
    writer: W,
) -> Result<ExportOutcome>
where
    S: NoteStore,
    C: ContentConverter + ?Sized,
    W: Write,
{
    match prepare(store, root_branch, options)? {
        None => Ok(ExportOutcome::Empty),
        Some(prepared) => Ok(ExportOutcome::Archive(write_archive(
            store, converter, &prepared, options, writer,
        )?)),
    }
}
