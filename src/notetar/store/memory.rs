use super::{sort_siblings, NoteStore};
use crate::error::{NotetarError, Result};
use crate::model::{Branch, BranchId, Note, NoteId};
use std::collections::HashMap;

/// In-memory storage for testing and development.
/// Does NOT persist data.
#[derive(Default)]
pub struct InMemoryStore {
    notes: HashMap<NoteId, Note>,
    branches: HashMap<BranchId, Branch>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteStore for InMemoryStore {
    fn get_note(&self, id: &NoteId) -> Result<Note> {
        self.notes
            .get(id)
            .cloned()
            .ok_or_else(|| NotetarError::NoteNotFound(id.clone()))
    }

    fn get_branch(&self, id: &BranchId) -> Result<Branch> {
        self.branches
            .get(id)
            .cloned()
            .ok_or_else(|| NotetarError::BranchNotFound(id.clone()))
    }

    fn child_branches(&self, parent: &NoteId) -> Result<Vec<Branch>> {
        let mut children: Vec<Branch> = self
            .branches
            .values()
            .filter(|b| &b.parent_note_id == parent)
            .cloned()
            .collect();
        sort_siblings(&mut children);
        Ok(children)
    }

    fn save_note(&mut self, note: &Note) -> Result<()> {
        self.notes.insert(note.note_id.clone(), note.clone());
        Ok(())
    }

    fn save_branch(&mut self, branch: &Branch) -> Result<()> {
        self.branches
            .insert(branch.branch_id.clone(), branch.clone());
        Ok(())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::NoteType;

    /// Id of the virtual parent the root branch hangs from.
    pub const ROOT_PARENT: &str = "none";

    /// Builds a note graph one placement at a time.
    ///
    /// Every `place*` call creates a branch; positions increase by 10 in call
    /// order so siblings come back in the order they were placed.
    pub struct TreeFixture {
        pub store: InMemoryStore,
        pub root_branch: BranchId,
        pub root: NoteId,
        next_position: i64,
    }

    impl TreeFixture {
        pub fn new(root: Note) -> Self {
            let mut store = InMemoryStore::new();
            let parent = NoteId::new(ROOT_PARENT);
            let branch = Branch::new(&parent, &root.note_id, 0);
            store.save_note(&root).unwrap();
            store.save_branch(&branch).unwrap();
            Self {
                store,
                root_branch: branch.branch_id,
                root: root.note_id,
                next_position: 10,
            }
        }

        pub fn text_root(title: &str, content: &str) -> Self {
            Self::new(Note::text(title, content).with_id(title.to_lowercase()))
        }

        /// Save `note` and place it under `parent`. Returns the note id.
        pub fn add(&mut self, parent: &NoteId, note: Note) -> NoteId {
            let id = note.note_id.clone();
            self.store.save_note(&note).unwrap();
            self.place(parent, &id);
            id
        }

        /// Shorthand for a text note; the id is derived from the title and
        /// placement order so titles may repeat.
        pub fn add_text(&mut self, parent: &NoteId, title: &str, content: &str) -> NoteId {
            let id = format!("{}-{}", title.to_lowercase(), self.next_position);
            self.add(parent, Note::text(title, content).with_id(id))
        }

        pub fn add_typed(
            &mut self,
            parent: &NoteId,
            title: &str,
            note_type: NoteType,
            mime: &str,
            content: &[u8],
        ) -> NoteId {
            let note = Note::new(title, note_type)
                .with_mime(mime)
                .with_content(content.to_vec());
            self.add(parent, note)
        }

        /// Place an existing note under another parent (creates a clone).
        pub fn place(&mut self, parent: &NoteId, child: &NoteId) -> BranchId {
            self.place_with_prefix(parent, child, None)
        }

        pub fn place_with_prefix(
            &mut self,
            parent: &NoteId,
            child: &NoteId,
            prefix: Option<&str>,
        ) -> BranchId {
            let mut branch = Branch::new(parent, child, self.next_position);
            branch.prefix = prefix.map(str::to_string);
            self.next_position += 10;
            self.store.save_branch(&branch).unwrap();
            branch.branch_id
        }

        pub fn update(&mut self, id: &NoteId, f: impl FnOnce(&mut Note)) {
            let mut note = self.store.get_note(id).unwrap();
            f(&mut note);
            self.store.save_note(&note).unwrap();
        }
    }
}
