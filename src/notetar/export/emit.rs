//! # Archive Emitter
//!
//! Second pass of an export: walks the filtered manifest in the same order
//! it was built and writes one archive entry per content file and per
//! directory, after the manifest itself.
//!
//! ```text
//! !!!meta.json          <- always first
//! Root                  <- directory entry
//! Root/P1               <- directory entry
//! Root/P1/X.md          <- content, read fresh from the store
//! Root/P2
//! Root/P2/X.clone       <- "Note is present at /Root/P1/X.md"
//! ```
//!
//! The manifest only holds metadata; content is fetched from the store at
//! the moment its entry is written, so large payloads are never all held
//! in memory at once.
//!
//! Entry paths are relative to the archive root. The paths quoted inside
//! clone placeholders are rooted (`/Root/P1/X.md`).

use std::collections::HashMap;
use std::io::{self, Read, Write};
use tar::{Builder, EntryType, Header};
use tracing::info;

use super::convert::{prepare_content, ContentConverter};
use super::manifest::{Manifest, ManifestNode, Registry};
use super::ExportFormat;
use crate::error::{NotetarError, Result};
use crate::model::NoteId;
use crate::store::NoteStore;

/// Name of the manifest entry; the leading `!` sorts it before any title.
pub const MANIFEST_ENTRY_NAME: &str = "!!!meta.json";

/// Destination for archive entries, written strictly in call order.
pub trait ArchiveSink {
    fn append_file(&mut self, path: &str, size: u64, mtime: u64, data: &mut dyn Read)
        -> Result<()>;

    fn append_dir(&mut self, path: &str, mtime: u64) -> Result<()>;

    /// No entries may be appended afterwards.
    fn finish(&mut self) -> Result<()>;
}

/// [`ArchiveSink`] writing a GNU tar stream.
pub struct TarSink<W: Write> {
    builder: Builder<W>,
    finished: bool,
}

impl<W: Write> TarSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            builder: Builder::new(writer),
            finished: false,
        }
    }

    /// Finish the archive (if needed) and hand back the writer.
    pub fn into_inner(self) -> Result<W> {
        self.builder
            .into_inner()
            .map_err(|e| NotetarError::Archive(format!("tar finish: {}", e)))
    }

    fn ensure_open(&self, path: &str) -> Result<()> {
        if self.finished {
            return Err(NotetarError::Archive(format!(
                "append '{}': archive already finished",
                path
            )));
        }
        Ok(())
    }
}

impl<W: Write> ArchiveSink for TarSink<W> {
    fn append_file(
        &mut self,
        path: &str,
        size: u64,
        mtime: u64,
        data: &mut dyn Read,
    ) -> Result<()> {
        self.ensure_open(path)?;
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(mtime);

        self.builder
            .append_data(&mut header, path, data)
            .map_err(|e| NotetarError::Archive(format!("append '{}': {}", path, e)))
    }

    fn append_dir(&mut self, path: &str, mtime: u64) -> Result<()> {
        self.ensure_open(path)?;
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(mtime);

        self.builder
            .append_data(&mut header, format!("{}/", path), io::empty())
            .map_err(|e| NotetarError::Archive(format!("append '{}/': {}", path, e)))
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.builder
            .finish()
            .map_err(|e| NotetarError::Archive(format!("tar finish: {}", e)))?;
        self.finished = true;
        Ok(())
    }
}

/// Counts of what went into the archive (the manifest entry excluded).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitReport {
    pub files: usize,
    pub directories: usize,
    pub clones: usize,
    pub bytes: u64,
}

pub struct ArchiveEmitter<'a, S: NoteStore, C: ContentConverter + ?Sized, A: ArchiveSink + ?Sized> {
    store: &'a S,
    converter: &'a C,
    sink: &'a mut A,
    format: ExportFormat,
    // archive-rooted path of each note's first occurrence
    note_paths: HashMap<NoteId, String>,
    report: EmitReport,
}

impl<'a, S, C, A> ArchiveEmitter<'a, S, C, A>
where
    S: NoteStore,
    C: ContentConverter + ?Sized,
    A: ArchiveSink + ?Sized,
{
    pub fn new(store: &'a S, converter: &'a C, sink: &'a mut A, format: ExportFormat) -> Self {
        Self {
            store,
            converter,
            sink,
            format,
            note_paths: HashMap::new(),
            report: EmitReport::default(),
        }
    }

    /// Write the manifest and every note entry, then finish the sink.
    pub fn emit(mut self, manifest: &Manifest) -> Result<EmitReport> {
        let manifest_json = manifest.to_json()?;
        self.write_file(MANIFEST_ENTRY_NAME, &manifest_json, 0)?;

        self.emit_node(&manifest.root, &manifest.registry, "")?;
        self.sink.finish()?;

        info!(
            files = self.report.files,
            directories = self.report.directories,
            clones = self.report.clones,
            bytes = self.report.bytes,
            "archive written"
        );
        Ok(self.report)
    }

    fn emit_node(&mut self, node: &ManifestNode, registry: &Registry, dir: &str) -> Result<()> {
        match node {
            ManifestNode::Clone(stub) => {
                let original = self.note_paths.get(&stub.note_id).ok_or_else(|| {
                    NotetarError::Archive(format!(
                        "clone of {} reached before its original",
                        stub.note_id
                    ))
                })?;
                let placeholder = format!("Note is present at {}", original);
                self.write_file(&join_path(dir, &stub.data_file_name), placeholder.as_bytes(), 0)?;
                self.report.clones += 1;
            }
            ManifestNode::Note(id) => {
                let meta = registry.resolve(id)?;
                let note = self.store.get_note(id)?;
                let mtime = u64::try_from(note.date_modified.timestamp()).unwrap_or(0);

                let own_name = meta
                    .data_file_name
                    .as_deref()
                    .or(meta.dir_file_name.as_deref());
                if let Some(name) = own_name {
                    self.note_paths
                        .insert(id.clone(), format!("/{}", join_path(dir, name)));
                }

                if let Some(data_file_name) = &meta.data_file_name {
                    let content = prepare_content(self.converter, note, self.format)?;
                    self.write_file(&join_path(dir, data_file_name), &content, mtime)?;
                    self.report.files += 1;
                }

                if let Some(dir_file_name) = &meta.dir_file_name {
                    let dir_path = join_path(dir, dir_file_name);
                    self.sink.append_dir(&dir_path, mtime)?;
                    self.report.directories += 1;
                    for child in &meta.children {
                        self.emit_node(child, registry, &dir_path)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_file(&mut self, path: &str, content: &[u8], mtime: u64) -> Result<()> {
        let size = content.len() as u64;
        self.sink.append_file(path, size, mtime, &mut &content[..])?;
        self.report.bytes += size;
        Ok(())
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
