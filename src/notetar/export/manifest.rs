//! # Manifest Builder
//!
//! The first pass of an export. Walks the branch graph depth-first from the
//! root branch, siblings in branch order, and projects it onto a strict tree
//! of [`ManifestNode`]s with unique on-disk names.
//!
//! ## One Owner per Note
//!
//! A note reachable through several branches must be described once. The
//! [`Registry`] owns the single canonical [`NoteMeta`] per note id; tree
//! nodes either point at it ([`ManifestNode::Note`]) or are lightweight
//! [`CloneStub`]s for every later occurrence.
//!
//! ```text
//! Root                  ManifestNode::Note("root")
//! ├── P1                ManifestNode::Note("p1")
//! │   └── X             ManifestNode::Note("x")      <- full metadata
//! └── P2                ManifestNode::Note("p2")
//!     └── X             ManifestNode::Clone{x, "X.clone"}
//! ```
//!
//! A note is registered *before* its children are visited, so a branch
//! cycle meets the note again as an already-registered id and ends in a
//! clone stub instead of recursing forever.
//!
//! ## Per-Occurrence Rules
//!
//! 1. A note carrying the exclusion label is skipped with its whole subtree.
//! 2. The base name is the sanitized `prefix - title` (or just `title`).
//! 3. Already registered: clone stub named `<base>.clone`, no recursion.
//! 4. Children get a fresh [`NameTable`]; the note itself is named in its
//!    parent's table.
//! 5. A data file is assigned when the note has content or no exported
//!    children; a directory when it has exported children.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::names::{base_file_name, data_file_extension, split_extension, NameTable};
use super::ExportFormat;
use crate::error::{NotetarError, Result};
use crate::model::{Attribute, Branch, Link, NoteId, NoteType};
use crate::store::NoteStore;

pub const MANIFEST_VERSION: u32 = 1;

/// Extension of the placeholder file written for a clone.
pub const CLONE_EXTENSION: &str = "clone";

/// Full metadata of a note, recorded at its first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMeta {
    pub note_id: NoteId,
    pub title: String,
    pub prefix: Option<String>,
    pub is_expanded: bool,
    pub note_position: i64,
    pub note_type: NoteType,
    pub mime: String,
    pub format: Option<ExportFormat>,
    pub attributes: Vec<Attribute>,
    pub links: Vec<Link>,
    pub data_file_name: Option<String>,
    pub dir_file_name: Option<String>,
    pub children: Vec<ManifestNode>,
}

/// A later occurrence of an already described note.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneStub {
    pub note_id: NoteId,
    pub title: String,
    pub prefix: Option<String>,
    pub is_expanded: bool,
    pub note_position: i64,
    pub note_type: NoteType,
    pub mime: String,
    pub data_file_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestNode {
    /// First occurrence; the metadata lives in the [`Registry`].
    Note(NoteId),
    Clone(CloneStub),
}

impl ManifestNode {
    pub fn note_id(&self) -> &NoteId {
        match self {
            ManifestNode::Note(id) => id,
            ManifestNode::Clone(stub) => &stub.note_id,
        }
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, ManifestNode::Clone(_))
    }
}

/// Owns the canonical metadata of every exported note.
#[derive(Debug, Default)]
pub struct Registry {
    metas: HashMap<NoteId, NoteMeta>,
}

impl Registry {
    pub fn contains(&self, id: &NoteId) -> bool {
        self.metas.contains_key(id)
    }

    pub fn get(&self, id: &NoteId) -> Option<&NoteMeta> {
        self.metas.get(id)
    }

    /// Like [`Registry::get`], for ids the tree is known to reference.
    pub fn resolve(&self, id: &NoteId) -> Result<&NoteMeta> {
        self.metas
            .get(id)
            .ok_or_else(|| NotetarError::NoteNotFound(id.clone()))
    }

    fn resolve_mut(&mut self, id: &NoteId) -> Result<&mut NoteMeta> {
        self.metas
            .get_mut(id)
            .ok_or_else(|| NotetarError::NoteNotFound(id.clone()))
    }

    fn insert(&mut self, meta: NoteMeta) {
        self.metas.insert(meta.note_id.clone(), meta);
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NoteId> {
        self.metas.keys()
    }

    pub fn metas_mut(&mut self) -> impl Iterator<Item = &mut NoteMeta> {
        self.metas.values_mut()
    }
}

/// The projected tree plus the registry its nodes point into.
#[derive(Debug)]
pub struct Manifest {
    pub root: ManifestNode,
    pub registry: Registry,
}

impl Manifest {
    pub fn root_meta(&self) -> Result<&NoteMeta> {
        self.registry.resolve(self.root.note_id())
    }

    /// Resolve the tree into its serializable form.
    pub fn document(&self) -> Result<ManifestDocument<'_>> {
        Ok(ManifestDocument {
            version: MANIFEST_VERSION,
            files: vec![NodeDocument::resolve(&self.root, &self.registry)?],
        })
    }

    /// The manifest entry body: tab-indented JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let document = self.document()?;
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        document
            .serialize(&mut serializer)
            .map_err(NotetarError::Serialization)?;
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
pub struct ManifestDocument<'a> {
    pub version: u32,
    pub files: Vec<NodeDocument<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument<'a> {
    pub is_clone: bool,
    pub note_id: &'a NoteId,
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<&'a str>,
    pub is_expanded: bool,
    pub note_position: i64,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub mime: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ExportFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<&'a [Attribute]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<&'a [Link]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir_file_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeDocument<'a>>>,
}

impl<'a> NodeDocument<'a> {
    fn resolve(node: &'a ManifestNode, registry: &'a Registry) -> Result<Self> {
        match node {
            ManifestNode::Clone(stub) => Ok(Self {
                is_clone: true,
                note_id: &stub.note_id,
                title: &stub.title,
                prefix: stub.prefix.as_deref(),
                is_expanded: stub.is_expanded,
                note_position: stub.note_position,
                note_type: stub.note_type,
                mime: &stub.mime,
                format: None,
                attributes: None,
                links: None,
                data_file_name: Some(&stub.data_file_name),
                dir_file_name: None,
                children: None,
            }),
            ManifestNode::Note(id) => {
                let meta = registry.resolve(id)?;
                let children = match meta.dir_file_name {
                    Some(_) => Some(
                        meta.children
                            .iter()
                            .map(|child| Self::resolve(child, registry))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    None => None,
                };
                Ok(Self {
                    is_clone: false,
                    note_id: &meta.note_id,
                    title: &meta.title,
                    prefix: meta.prefix.as_deref(),
                    is_expanded: meta.is_expanded,
                    note_position: meta.note_position,
                    note_type: meta.note_type,
                    mime: &meta.mime,
                    format: meta.format,
                    attributes: Some(&meta.attributes),
                    links: Some(&meta.links),
                    data_file_name: meta.data_file_name.as_deref(),
                    dir_file_name: meta.dir_file_name.as_deref(),
                    children,
                })
            }
        }
    }
}

/// Walks the branch graph and records the manifest.
pub struct ManifestBuilder<'a, S: NoteStore> {
    store: &'a S,
    format: ExportFormat,
    exclude_label: &'a str,
    registry: Registry,
}

impl<'a, S: NoteStore> ManifestBuilder<'a, S> {
    pub fn new(store: &'a S, format: ExportFormat, exclude_label: &'a str) -> Self {
        Self {
            store,
            format,
            exclude_label,
            registry: Registry::default(),
        }
    }

    /// Returns `None` when the root note itself is excluded.
    pub fn build(mut self, root_branch: &Branch) -> Result<Option<Manifest>> {
        let mut top_level = NameTable::new();
        let root = self.visit(root_branch, &mut top_level)?;
        Ok(root.map(|root| Manifest {
            root,
            registry: self.registry,
        }))
    }

    fn visit(&mut self, branch: &Branch, names: &mut NameTable) -> Result<Option<ManifestNode>> {
        let note = self.store.get_note(&branch.note_id)?;
        if note.has_label(self.exclude_label) {
            debug!(note_id = %note.note_id, label = self.exclude_label, "skipping excluded note");
            return Ok(None);
        }

        let base = base_file_name(&branch.display_title(&note.title));

        if self.registry.contains(&note.note_id) {
            let data_file_name = names.reserve(&base, Some(CLONE_EXTENSION));
            debug!(note_id = %note.note_id, file = %data_file_name, "note already exported, writing clone");
            return Ok(Some(ManifestNode::Clone(CloneStub {
                note_id: note.note_id,
                title: note.title,
                prefix: branch.prefix.clone(),
                is_expanded: branch.is_expanded,
                note_position: branch.note_position,
                note_type: note.note_type,
                mime: note.mime,
                data_file_name,
            })));
        }

        // Registered before the children are visited so cycles end in a clone.
        self.registry.insert(NoteMeta {
            note_id: note.note_id.clone(),
            title: note.title.clone(),
            prefix: branch.prefix.clone(),
            is_expanded: branch.is_expanded,
            note_position: branch.note_position,
            note_type: note.note_type,
            mime: note.mime.clone(),
            format: (note.note_type == NoteType::Text).then_some(self.format),
            attributes: note.attributes.clone(),
            links: note.links.clone(),
            data_file_name: None,
            dir_file_name: None,
            children: Vec::new(),
        });

        let mut child_names = NameTable::new();
        let mut children = Vec::new();
        for child_branch in self.store.child_branches(&note.note_id)? {
            if let Some(child) = self.visit(&child_branch, &mut child_names)? {
                children.push(child);
            }
        }

        let data_file_name = if !note.content.is_empty() || children.is_empty() {
            let (stem, extension) = split_extension(&base, data_file_extension(&note, self.format));
            Some(names.reserve(stem, Some(extension)))
        } else {
            None
        };
        let dir_file_name = (!children.is_empty()).then(|| names.reserve(&base, None));

        let meta = self.registry.resolve_mut(&note.note_id)?;
        meta.data_file_name = data_file_name;
        meta.dir_file_name = dir_file_name;
        meta.children = children;

        Ok(Some(ManifestNode::Note(note.note_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, Note};
    use crate::store::memory::fixtures::TreeFixture;
    use crate::store::NoteStore;

    const EXCLUDE: &str = "excludeFromExport";

    fn build(fx: &TreeFixture, format: ExportFormat) -> Option<Manifest> {
        let branch = fx.store.get_branch(&fx.root_branch).unwrap();
        ManifestBuilder::new(&fx.store, format, EXCLUDE)
            .build(&branch)
            .unwrap()
    }

    fn meta<'m>(manifest: &'m Manifest, id: &NoteId) -> &'m NoteMeta {
        manifest.registry.get(id).unwrap()
    }

    #[test]
    fn test_case_insensitive_sibling_names() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let upper = fx.add_text(&root, "A", "hi");
        let lower = fx.add_text(&root, "a", "bye");

        let manifest = build(&fx, ExportFormat::Markdown).unwrap();
        let root_meta = manifest.root_meta().unwrap();
        assert_eq!(root_meta.dir_file_name.as_deref(), Some("Root"));
        assert_eq!(root_meta.data_file_name, None);
        assert_eq!(
            meta(&manifest, &upper).data_file_name.as_deref(),
            Some("A.md")
        );
        assert_eq!(
            meta(&manifest, &lower).data_file_name.as_deref(),
            Some("a_1.md")
        );
    }

    #[test]
    fn test_empty_leaf_gets_data_file() {
        let fx = TreeFixture::text_root("Root", "");
        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let root_meta = manifest.root_meta().unwrap();
        assert_eq!(root_meta.data_file_name.as_deref(), Some("Root.html"));
        assert_eq!(root_meta.dir_file_name, None);
        assert!(root_meta.children.is_empty());
    }

    #[test]
    fn test_parent_with_content_gets_file_and_directory() {
        let mut fx = TreeFixture::text_root("Root", "<p>intro</p>");
        let root = fx.root.clone();
        fx.add_text(&root, "Child", "");

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let root_meta = manifest.root_meta().unwrap();
        assert_eq!(root_meta.data_file_name.as_deref(), Some("Root.html"));
        assert_eq!(root_meta.dir_file_name.as_deref(), Some("Root"));
    }

    #[test]
    fn test_excluded_root_is_empty_export() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        fx.update(&root, |n| n.attributes.push(Attribute::label(EXCLUDE, "")));
        assert!(build(&fx, ExportFormat::Html).is_none());
    }

    #[test]
    fn test_excluded_child_pruned_with_subtree() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let hidden = fx.add_text(&root, "Hidden", "");
        let grandchild = fx.add_text(&hidden, "Deep", "deep");
        let visible = fx.add_text(&root, "Visible", "v");
        fx.update(&hidden, |n| n.attributes.push(Attribute::label(EXCLUDE, "")));

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let root_meta = manifest.root_meta().unwrap();
        assert_eq!(root_meta.children, vec![ManifestNode::Note(visible)]);
        assert!(!manifest.registry.contains(&hidden));
        assert!(!manifest.registry.contains(&grandchild));
    }

    #[test]
    fn test_all_children_excluded_makes_a_leaf() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let hidden = fx.add_text(&root, "Hidden", "");
        fx.update(&hidden, |n| n.attributes.push(Attribute::label(EXCLUDE, "")));

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let root_meta = manifest.root_meta().unwrap();
        assert_eq!(root_meta.dir_file_name, None);
        assert_eq!(root_meta.data_file_name.as_deref(), Some("Root.html"));
    }

    #[test]
    fn test_second_occurrence_is_clone() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let p1 = fx.add_text(&root, "P1", "");
        let p2 = fx.add_text(&root, "P2", "");
        let x = fx.add_text(&p1, "X", "content");
        fx.place(&p2, &x);

        let manifest = build(&fx, ExportFormat::Markdown).unwrap();
        assert_eq!(meta(&manifest, &p1).children, vec![ManifestNode::Note(x.clone())]);

        let p2_children = &meta(&manifest, &p2).children;
        assert_eq!(p2_children.len(), 1);
        match &p2_children[0] {
            ManifestNode::Clone(stub) => {
                assert_eq!(stub.note_id, x);
                assert_eq!(stub.data_file_name, "X.clone");
            }
            other => panic!("expected clone, got {:?}", other),
        }
        assert_eq!(meta(&manifest, &x).data_file_name.as_deref(), Some("X.md"));
    }

    #[test]
    fn test_clone_does_not_expand_subtree() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let p1 = fx.add_text(&root, "P1", "");
        let p2 = fx.add_text(&root, "P2", "");
        let x = fx.add_text(&p1, "X", "");
        fx.add_text(&x, "Under X", "");
        fx.place(&p2, &x);

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let doc = manifest.document().unwrap();
        let p2_doc = &doc.files[0].children.as_ref().unwrap()[1];
        let clone_doc = &p2_doc.children.as_ref().unwrap()[0];
        assert!(clone_doc.is_clone);
        assert!(clone_doc.children.is_none());
        assert!(clone_doc.dir_file_name.is_none());
    }

    #[test]
    fn test_cycle_terminates_in_clone() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let a = fx.add_text(&root, "A", "");
        fx.place(&a, &root);

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let a_children = &meta(&manifest, &a).children;
        assert_eq!(a_children.len(), 1);
        assert!(a_children[0].is_clone());
        assert_eq!(a_children[0].note_id(), &root);
        assert_eq!(manifest.registry.len(), 2);
    }

    #[test]
    fn test_prefix_in_file_name() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let note = Note::text("Journal", "x").with_id("journal");
        fx.store.save_note(&note).unwrap();
        fx.place_with_prefix(&root, &note.note_id, Some("2024"));

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let journal = meta(&manifest, &note.note_id);
        assert_eq!(journal.data_file_name.as_deref(), Some("2024 - Journal.html"));
        assert_eq!(journal.prefix.as_deref(), Some("2024"));
    }

    #[test]
    fn test_extension_not_duplicated() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let notes = fx.add_text(&root, "notes.MD", "x");
        let again = fx.add_text(&root, "Notes.md", "y");

        let manifest = build(&fx, ExportFormat::Markdown).unwrap();
        assert_eq!(
            meta(&manifest, &notes).data_file_name.as_deref(),
            Some("notes.MD")
        );
        assert_eq!(
            meta(&manifest, &again).data_file_name.as_deref(),
            Some("Notes_1.md")
        );
    }

    #[test]
    fn test_title_extension_keeps_its_case() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let report = fx.add_text(&root, "Report.HTML", "<p>q3</p>");

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        assert_eq!(
            meta(&manifest, &report).data_file_name.as_deref(),
            Some("Report.HTML")
        );
    }

    #[test]
    fn test_long_sibling_titles_stay_within_name_max() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let title = "a".repeat(300);
        let first = fx.add_text(&root, &title, "x");
        let second = fx.add_text(&root, &title, "y");

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        let root_meta = manifest.root_meta().unwrap();
        let names: Vec<String> = root_meta
            .children
            .iter()
            .map(|child| match child {
                ManifestNode::Note(id) => meta(&manifest, id).data_file_name.clone().unwrap(),
                ManifestNode::Clone(stub) => stub.data_file_name.clone(),
            })
            .collect();

        assert_eq!(names.len(), 2);
        for name in &names {
            assert!(name.len() <= 255, "{} bytes", name.len());
        }
        assert!(names[1].ends_with("_1.html"));
        assert_ne!(meta(&manifest, &second).data_file_name, meta(&manifest, &first).data_file_name);
    }

    #[test]
    fn test_files_and_directories_share_namespace() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let folder = fx.add_text(&root, "A.md", "");
        fx.add_text(&folder, "Inside", "");
        let file = fx.add_text(&root, "a", "x");

        let manifest = build(&fx, ExportFormat::Markdown).unwrap();
        assert_eq!(meta(&manifest, &folder).dir_file_name.as_deref(), Some("A.md"));
        assert_eq!(meta(&manifest, &file).data_file_name.as_deref(), Some("a_1.md"));
    }

    #[test]
    fn test_names_are_scoped_per_directory() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let left = fx.add_text(&root, "Left", "");
        let right = fx.add_text(&root, "Right", "");
        let a = fx.add_text(&left, "Same", "1");
        let b = fx.add_text(&right, "Same", "2");

        let manifest = build(&fx, ExportFormat::Html).unwrap();
        assert_eq!(meta(&manifest, &a).data_file_name.as_deref(), Some("Same.html"));
        assert_eq!(meta(&manifest, &b).data_file_name.as_deref(), Some("Same.html"));
    }

    #[test]
    fn test_format_only_on_text_notes() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let image = fx.add_typed(&root, "Pic", NoteType::Image, "image/png", b"\x89PNG");

        let manifest = build(&fx, ExportFormat::Markdown).unwrap();
        assert_eq!(manifest.root_meta().unwrap().format, Some(ExportFormat::Markdown));
        let image_meta = meta(&manifest, &image);
        assert_eq!(image_meta.format, None);
        assert_eq!(image_meta.data_file_name.as_deref(), Some("Pic.png"));
    }

    #[test]
    fn test_manifest_json_shape() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        let p1 = fx.add_text(&root, "P1", "");
        let p2 = fx.add_text(&root, "P2", "");
        let x = fx.add_text(&p1, "X", "x");
        fx.place(&p2, &x);

        let manifest = build(&fx, ExportFormat::Markdown).unwrap();
        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();
        assert!(json.starts_with("{\n\t\"version\": 1,"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let root_doc = &value["files"][0];
        assert_eq!(root_doc["dirFileName"], "Root");
        assert!(root_doc.get("dataFileName").is_none());
        assert!(root_doc.get("prefix").is_none());
        assert_eq!(root_doc["format"], "markdown");

        let clone_doc = &root_doc["children"][1]["children"][0];
        assert_eq!(clone_doc["isClone"], true);
        assert_eq!(clone_doc["dataFileName"], "X.clone");
        assert!(clone_doc.get("attributes").is_none());
        assert!(clone_doc.get("links").is_none());
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        for title in ["b", "B", "b", "c"] {
            fx.add_text(&root, title, "x");
        }

        let first = build(&fx, ExportFormat::Html).unwrap().to_json().unwrap();
        let second = build(&fx, ExportFormat::Html).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_note_propagates_error() {
        let mut fx = TreeFixture::text_root("Root", "");
        let root = fx.root.clone();
        fx.place(&root, &NoteId::new("ghost"));

        let branch = fx.store.get_branch(&fx.root_branch).unwrap();
        let result = ManifestBuilder::new(&fx.store, ExportFormat::Html, EXCLUDE).build(&branch);
        assert!(matches!(result, Err(NotetarError::NoteNotFound(_))));
    }
}
