//! # Archive Filenames
//!
//! Everything that decides what a note is called inside the archive:
//!
//! - [`sanitize_filename`] strips characters that are illegal on common
//!   filesystems.
//! - [`data_file_extension`] picks the extension of a note's content file.
//! - [`NameTable`] hands out case-insensitively unique names within one
//!   directory level.
//!
//! ## Uniqueness
//!
//! Files and subdirectories of the same directory share one namespace, and
//! names are compared lowercased so the archive can be unpacked on
//! case-insensitive filesystems. On collision a `_<n>` suffix is inserted
//! before the extension:
//!
//! ```text
//! A.md   -> A.md
//! a.md   -> a_1.md
//! A.md   -> A_2.md
//! ```
//!
//! A table only ever covers one directory level; each directory starts with
//! a fresh one.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::ExportFormat;
use crate::model::{Note, NoteType};

/// Used when a note's mime type has no known extension.
pub const FALLBACK_EXTENSION: &str = "dat";

/// Used when sanitizing leaves nothing of the title.
pub const UNTITLED: &str = "untitled";

/// NAME_MAX on ext4, APFS and NTFS.
const MAX_FILENAME_BYTES: usize = 255;

/// Sanitized titles are cut here, leaving room for `_<n>` and an extension.
const MAX_STEM_BYTES: usize = 200;

const JAVASCRIPT_MIMES: &[&str] = &[
    "application/javascript",
    "application/x-javascript",
    "text/javascript",
];

const WINDOWS_RESERVED: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

// mime_guess lists every extension it knows for a type, in no useful order
// for the common ones, so these get a fixed answer.
static PREFERRED_EXTENSIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("text/html", "html"),
        ("text/plain", "txt"),
        ("text/markdown", "md"),
        ("text/x-markdown", "md"),
        ("text/css", "css"),
        ("text/csv", "csv"),
        ("text/xml", "xml"),
        ("text/x-python", "py"),
        ("text/x-rustsrc", "rs"),
        ("text/x-sh", "sh"),
        ("text/x-csrc", "c"),
        ("text/x-java", "java"),
        ("application/json", "json"),
        ("application/xml", "xml"),
        ("application/pdf", "pdf"),
        ("application/zip", "zip"),
        ("image/png", "png"),
        ("image/jpeg", "jpg"),
        ("image/gif", "gif"),
        ("image/svg+xml", "svg"),
        ("image/webp", "webp"),
    ])
});

/// Remove characters that are illegal in filenames on mainstream filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | '?' | '<' | '>' | ':' | '*' | '|' | '"'))
        .collect();

    let trimmed = cleaned.trim_end_matches(['.', ' ']).trim_start();
    if trimmed.is_empty() {
        return String::new();
    }

    let stem = trimmed.split('.').next().unwrap_or(trimmed);
    if WINDOWS_RESERVED.contains(&stem.to_lowercase().as_str()) {
        let reserved = format!("_{}", trimmed);
        return truncate_on_char_boundary(&reserved, MAX_STEM_BYTES).to_string();
    }

    truncate_on_char_boundary(trimmed, MAX_STEM_BYTES).to_string()
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Sanitized base name for a note placement, never empty.
pub fn base_file_name(display_title: &str) -> String {
    let sanitized = sanitize_filename(display_title);
    if sanitized.is_empty() {
        UNTITLED.to_string()
    } else {
        sanitized
    }
}

/// Conventional extension for a mime type, if one is known.
pub fn mime_extension(mime: &str) -> Option<&'static str> {
    let mime = mime.split(';').next().unwrap_or(mime).trim();
    if mime.is_empty() {
        return None;
    }
    if let Some(ext) = PREFERRED_EXTENSIONS.get(mime.to_lowercase().as_str()) {
        return Some(*ext);
    }
    mime_guess::get_mime_extensions_str(mime).and_then(|exts| exts.first().copied())
}

/// Extension of the content file written for `note`.
pub fn data_file_extension(note: &Note, format: ExportFormat) -> &'static str {
    if note.note_type == NoteType::Text && format == ExportFormat::Markdown {
        return "md";
    }
    if JAVASCRIPT_MIMES.contains(&note.mime.to_lowercase().as_str()) {
        return "js";
    }
    mime_extension(&note.mime).unwrap_or(FALLBACK_EXTENSION)
}

/// Split `name` into stem and extension when it already ends with
/// `.extension` (any case), keeping the extension as written. Otherwise
/// the whole name is the stem and `extension` is returned as is.
pub fn split_extension<'a>(name: &'a str, extension: &'a str) -> (&'a str, &'a str) {
    let suffix_len = extension.len() + 1;
    if name.len() <= suffix_len {
        return (name, extension);
    }
    let split = name.len() - suffix_len;
    if !name.is_char_boundary(split) {
        return (name, extension);
    }
    let (stem, suffix) = name.split_at(split);
    if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(extension) {
        (stem, &suffix[1..])
    } else {
        (name, extension)
    }
}

/// `stem` + `suffix` + `.extension`, with the stem cut so the whole name
/// stays within [`MAX_FILENAME_BYTES`].
fn bounded_name(stem: &str, suffix: &str, extension: Option<&str>) -> String {
    let tail = suffix.len() + extension.map_or(0, |ext| ext.len() + 1);
    let stem = truncate_on_char_boundary(stem, MAX_FILENAME_BYTES.saturating_sub(tail));
    match extension {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext),
        None => format!("{}{}", stem, suffix),
    }
}

/// Names already handed out within one directory level.
#[derive(Debug, Default)]
pub struct NameTable {
    // lowercased name -> next suffix to try
    counters: HashMap<String, u32>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `stem[.extension]`, or the first free `stem_<n>[.extension]`.
    pub fn reserve(&mut self, stem: &str, extension: Option<&str>) -> String {
        let candidate = bounded_name(stem, "", extension);
        let key = candidate.to_lowercase();

        let Some(&start) = self.counters.get(&key) else {
            self.counters.insert(key, 1);
            return candidate;
        };

        let mut n = start;
        loop {
            let name = bounded_name(stem, &format!("_{}", n), extension);
            n += 1;
            let name_key = name.to_lowercase();
            if !self.counters.contains_key(&name_key) {
                self.counters.insert(key, n);
                self.counters.insert(name_key, 1);
                return name;
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counters.contains_key(&name.to_lowercase())
    }
}
