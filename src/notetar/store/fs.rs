use super::{sort_siblings, NoteStore};
use crate::error::{NotetarError, Result};
use crate::model::{Branch, BranchId, Note, NoteId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const DATA_FILENAME: &str = "data.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    branches: Vec<Branch>,
}

/// `data.json` indexed for lookups by id and by parent.
#[derive(Debug, Default)]
struct Snapshot {
    notes: HashMap<NoteId, Note>,
    branches: HashMap<BranchId, Branch>,
    children: HashMap<NoteId, Vec<BranchId>>,
}

impl From<StoreData> for Snapshot {
    fn from(data: StoreData) -> Self {
        let mut snapshot = Snapshot::default();
        for note in data.notes {
            snapshot.notes.insert(note.note_id.clone(), note);
        }
        for branch in data.branches {
            snapshot
                .children
                .entry(branch.parent_note_id.clone())
                .or_default()
                .push(branch.branch_id.clone());
            snapshot.branches.insert(branch.branch_id.clone(), branch);
        }
        snapshot
    }
}

pub struct FileStore {
    root: PathBuf,
    // Parsed on first read, dropped on every save.
    snapshot: RefCell<Option<Rc<Snapshot>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot: RefCell::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn content_path(&self, id: &NoteId) -> Result<PathBuf> {
        let raw = id.as_str();
        if raw.is_empty() || raw.contains(['/', '\\']) || raw.contains("..") {
            return Err(NotetarError::Store(format!("Invalid note id: {:?}", raw)));
        }
        Ok(self.root.join(format!("note-{}.dat", raw)))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(NotetarError::Io)?;
        }
        Ok(())
    }

    fn load_data(&self) -> Result<StoreData> {
        let data_file = self.root.join(DATA_FILENAME);
        if !data_file.exists() {
            return Ok(StoreData::default());
        }
        let content = fs::read_to_string(data_file).map_err(NotetarError::Io)?;
        let data: StoreData =
            serde_json::from_str(&content).map_err(NotetarError::Serialization)?;
        Ok(data)
    }

    fn save_data(&self, data: &StoreData) -> Result<()> {
        self.snapshot.replace(None);
        let data_file = self.root.join(DATA_FILENAME);
        let content = serde_json::to_string_pretty(data).map_err(NotetarError::Serialization)?;
        fs::write(data_file, content).map_err(NotetarError::Io)?;
        Ok(())
    }

    fn snapshot(&self) -> Result<Rc<Snapshot>> {
        if let Some(snapshot) = self.snapshot.borrow().as_ref() {
            return Ok(Rc::clone(snapshot));
        }
        let snapshot = Rc::new(Snapshot::from(self.load_data()?));
        self.snapshot.replace(Some(Rc::clone(&snapshot)));
        Ok(snapshot)
    }
}

impl NoteStore for FileStore {
    fn get_note(&self, id: &NoteId) -> Result<Note> {
        // 1. Get metadata
        let mut note = self
            .snapshot()?
            .notes
            .get(id)
            .cloned()
            .ok_or_else(|| NotetarError::NoteNotFound(id.clone()))?;

        // 2. Read content; a missing file means the note is empty
        let path = self.content_path(id)?;
        if path.exists() {
            note.content = fs::read(path).map_err(NotetarError::Io)?;
        }

        Ok(note)
    }

    fn get_branch(&self, id: &BranchId) -> Result<Branch> {
        self.snapshot()?
            .branches
            .get(id)
            .cloned()
            .ok_or_else(|| NotetarError::BranchNotFound(id.clone()))
    }

    fn child_branches(&self, parent: &NoteId) -> Result<Vec<Branch>> {
        let snapshot = self.snapshot()?;
        let mut children: Vec<Branch> = snapshot
            .children
            .get(parent)
            .into_iter()
            .flatten()
            .filter_map(|id| snapshot.branches.get(id).cloned())
            .collect();
        sort_siblings(&mut children);
        Ok(children)
    }

    fn save_note(&mut self, note: &Note) -> Result<()> {
        self.ensure_dir()?;
        let path = self.content_path(&note.note_id)?;

        // 1. Update metadata
        let mut data = self.load_data()?;
        match data.notes.iter_mut().find(|n| n.note_id == note.note_id) {
            Some(existing) => *existing = note.clone(),
            None => data.notes.push(note.clone()),
        }
        self.save_data(&data)?;

        // 2. Write content file
        fs::write(path, &note.content).map_err(NotetarError::Io)?;

        Ok(())
    }

    fn save_branch(&mut self, branch: &Branch) -> Result<()> {
        self.ensure_dir()?;
        let mut data = self.load_data()?;
        match data
            .branches
            .iter_mut()
            .find(|b| b.branch_id == branch.branch_id)
        {
            Some(existing) => *existing = branch.clone(),
            None => data.branches.push(branch.clone()),
        }
        self.save_data(&data)
    }
}
