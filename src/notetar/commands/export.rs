use crate::commands::{CmdMessage, CmdResult};
use crate::error::{NotetarError, Result};
use crate::export::convert::ContentConverter;
use crate::export::{prepare, write_archive, ExportOptions, ExportOutcome, ExportSummary, PreparedExport};
use crate::model::BranchId;
use crate::store::NoteStore;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Export the subtree under `branch` to a tar file.
///
/// With no `output`, the archive lands in `out_dir` under a name derived from
/// the root note.
pub fn run<S, C>(
    store: &S,
    converter: &C,
    branch: &BranchId,
    options: &ExportOptions,
    output: Option<&Path>,
    out_dir: &Path,
) -> Result<CmdResult>
where
    S: NoteStore,
    C: ContentConverter + ?Sized,
{
    let Some(prepared) = prepare(store, branch, options)? else {
        let mut res = CmdResult::default().with_outcome(ExportOutcome::Empty);
        res.add_message(CmdMessage::info(
            "Nothing to export: the root note is excluded from export.",
        ));
        return Ok(res);
    };

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => out_dir.join(&prepared.file_name),
    };
    let summary = write_file(store, converter, &prepared, options, &path)?;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Exported {} notes to {}",
        summary.notes,
        path.display()
    )));
    let dropped = summary.filter.dropped_attributes + summary.filter.dropped_links;
    if dropped > 0 {
        result.add_message(CmdMessage::info(format!(
            "Dropped {} references to notes outside the export",
            dropped
        )));
    }
    Ok(result
        .with_outcome(ExportOutcome::Archive(summary))
        .with_archive_path(path))
}

fn write_file<S, C>(
    store: &S,
    converter: &C,
    prepared: &PreparedExport,
    options: &ExportOptions,
    path: &Path,
) -> Result<ExportSummary>
where
    S: NoteStore,
    C: ContentConverter + ?Sized,
{
    write_atomically(path, |temp_path| {
        let file = File::create(temp_path)?;
        write_archive(store, converter, prepared, options, BufWriter::new(file))
    })
}

/// Run `write` against a sibling temp file and rename it into place only on
/// success. On failure the temp file is removed and `path` is untouched.
fn write_atomically<T>(path: &Path, write: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let temp_path = temp_path_for(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    match write(&temp_path) {
        Ok(value) => {
            fs::rename(&temp_path, path)?;
            debug!(path = %path.display(), "archive written");
            Ok(value)
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| NotetarError::Api(format!("Invalid output path: {}", path.display())))?;
    let mut temp_name = name.to_os_string();
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::convert::DefaultConverter;
    use crate::export::ExportFormat;
    use crate::model::Attribute;
    use crate::store::memory::fixtures::TreeFixture;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    /// Passes `remaining` bytes through to `inner`, then fails.
    struct FailAfter<W> {
        inner: W,
        remaining: usize,
    }

    impl<W: Write> Write for FailAfter<W> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "no space left on device",
                ));
            }
            let n = buf.len().min(self.remaining);
            let written = self.inner.write(&buf[..n])?;
            self.remaining -= written;
            Ok(written)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    struct FailingConverter;

    impl ContentConverter for FailingConverter {
        fn pretty_print_html(&self, html: &str) -> String {
            html.to_string()
        }

        fn html_to_markdown(&self, _html: &str) -> Result<String> {
            Err(NotetarError::Conversion("boom".to_string()))
        }
    }

    fn sample() -> TreeFixture {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        fx.add_text(&root, "Child", "<p>c</p>");
        fx
    }

    #[test]
    fn test_export_writes_named_archive() {
        let fx = sample();
        let dir = tempdir().unwrap();
        let result = run(
            &fx.store,
            &DefaultConverter,
            &fx.root_branch,
            &ExportOptions::default(),
            None,
            dir.path(),
        )
        .unwrap();

        let path = dir.path().join("Root.tar");
        assert_eq!(result.archive_path.as_deref(), Some(path.as_path()));
        assert!(path.exists());
        assert_eq!(result.messages[0].level, crate::commands::MessageLevel::Success);

        let mut archive = tar::Archive::new(File::open(&path).unwrap());
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            names.push(entry.path().unwrap().to_string_lossy().into_owned());
            let mut sink = Vec::new();
            entry.read_to_end(&mut sink).unwrap();
        }
        assert_eq!(names, vec!["!!!meta.json", "Root/", "Root/Child.html"]);
    }

    #[test]
    fn test_export_to_explicit_output() {
        let fx = sample();
        let dir = tempdir().unwrap();
        let output = dir.path().join("nested").join("out.tar");
        run(
            &fx.store,
            &DefaultConverter,
            &fx.root_branch,
            &ExportOptions::default(),
            Some(&output),
            dir.path(),
        )
        .unwrap();
        assert!(output.exists());
        assert!(!dir.path().join("Root.tar").exists());
    }

    #[test]
    fn test_empty_export_creates_no_file() {
        let mut fx = sample();
        let root = fx.root.clone();
        fx.update(&root, |n| {
            n.attributes.push(Attribute::label("excludeFromExport", ""))
        });
        let dir = tempdir().unwrap();

        let result = run(
            &fx.store,
            &DefaultConverter,
            &fx.root_branch,
            &ExportOptions::default(),
            None,
            dir.path(),
        )
        .unwrap();

        assert_eq!(result.outcome, Some(ExportOutcome::Empty));
        assert!(result.archive_path.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_export_leaves_nothing_behind() {
        let fx = sample();
        let dir = tempdir().unwrap();
        let options = ExportOptions {
            format: ExportFormat::Markdown,
            ..Default::default()
        };

        let result = run(
            &fx.store,
            &FailingConverter,
            &fx.root_branch,
            &options,
            None,
            dir.path(),
        );

        assert!(matches!(result, Err(NotetarError::Conversion(_))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_disk_full_leaves_no_archive() {
        let fx = sample();
        let prepared = prepare(&fx.store, &fx.root_branch, &ExportOptions::default())
            .unwrap()
            .unwrap();

        for gzip in [false, true] {
            let dir = tempdir().unwrap();
            let target = dir.path().join("Root.tar");
            let options = ExportOptions {
                gzip,
                ..Default::default()
            };

            let result = write_atomically(&target, |temp_path| {
                let file = File::create(temp_path)?;
                let writer = BufWriter::new(FailAfter {
                    inner: file,
                    remaining: 16,
                });
                write_archive(&fx.store, &DefaultConverter, &prepared, &options, writer)
            });

            assert!(matches!(result, Err(NotetarError::Io(_))), "gzip={}", gzip);
            assert!(!target.exists());
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_successful_write_replaces_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.tar");
        fs::write(&target, b"old").unwrap();

        write_atomically(&target, |temp_path| Ok(fs::write(temp_path, b"new")?)).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path_for(Path::new("/tmp/out/Root.tar.gz")).unwrap();
        assert_eq!(temp, PathBuf::from("/tmp/out/Root.tar.gz.tmp"));
    }
}
