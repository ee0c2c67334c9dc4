use crate::commands::{CmdMessage, CmdResult};
use crate::error::{NotetarError, Result};
use crate::export::{prepare, ExportOptions, ExportOutcome};
use crate::model::BranchId;
use crate::store::NoteStore;

/// Build and filter the manifest without writing an archive.
pub fn run<S: NoteStore>(store: &S, branch: &BranchId, options: &ExportOptions) -> Result<CmdResult> {
    let Some(prepared) = prepare(store, branch, options)? else {
        let mut res = CmdResult::default().with_outcome(ExportOutcome::Empty);
        res.add_message(CmdMessage::info(
            "Nothing to export: the root note is excluded from export.",
        ));
        return Ok(res);
    };

    let json = String::from_utf8(prepared.manifest.to_json()?)
        .map_err(|e| NotetarError::Api(format!("Manifest is not valid UTF-8: {}", e)))?;
    Ok(CmdResult::default().with_manifest_json(json))
}
