//! # Storage Layer
//!
//! The exporter never talks to a database directly. It reads notes and
//! branches through the [`NoteStore`] trait so that the traversal logic can
//! be exercised against an in-memory graph in tests and against the on-disk
//! store in production.
//!
//! ## Implementations
//!
//! - [`fs::FileStore`]: Production file-based storage
//!   - Note metadata and branches stored in `data.json`
//!   - Note content in individual files: `note-{noteId}.dat`
//!
//! - [`memory::InMemoryStore`]: In-memory storage for testing
//!   - No persistence
//!   - Fast, isolated test execution
//!
//! ## Storage Format
//!
//! For `FileStore`:
//! ```text
//! store/
//! ├── data.json           # {"notes": [...], "branches": [...]}
//! ├── config.json         # Export configuration
//! └── note-{id}.dat       # Raw note content
//! ```
//!
//! Metadata and content are stored separately so walking the tree only reads
//! the content files that are actually needed.
//!
//! ## Ordering
//!
//! [`NoteStore::child_branches`] must return branches sorted by
//! `note_position` (ties broken by branch id). Export filenames are assigned
//! in this order, so an unstable order would make exports non-deterministic.

use crate::error::Result;
use crate::model::{Branch, BranchId, Note, NoteId};

pub mod fs;
pub mod memory;

/// Abstract interface for note storage.
pub trait NoteStore {
    /// Fetch a note, including its content
    fn get_note(&self, id: &NoteId) -> Result<Note>;

    /// Fetch a branch by id
    fn get_branch(&self, id: &BranchId) -> Result<Branch>;

    /// Child branches of a note, in sibling order
    fn child_branches(&self, parent: &NoteId) -> Result<Vec<Branch>>;

    /// Save a note (create or update)
    fn save_note(&mut self, note: &Note) -> Result<()>;

    /// Save a branch (create or update)
    fn save_branch(&mut self, branch: &Branch) -> Result<()>;
}

pub(crate) fn sort_siblings(branches: &mut [Branch]) {
    branches.sort_by(|a, b| {
        a.note_position
            .cmp(&b.note_position)
            .then_with(|| a.branch_id.cmp(&b.branch_id))
    });
}
