//! # Domain Model: Notes, Branches and Their Metadata
//!
//! This module defines the read-only entities the exporter consumes:
//! [`Note`], [`Branch`], [`Attribute`] and [`Link`].
//!
//! ## Notes Form a Graph, Not a Tree
//!
//! A note is attached to the hierarchy through one or more [`Branch`]es. Each
//! branch pairs a parent note with a child note and carries the
//! presentation details that belong to *that placement*: an optional display
//! prefix, a sort position among siblings and the expanded/collapsed UI hint.
//!
//! ```text
//!        Root
//!       /    \
//!     P1      P2
//!       \    /
//!         X          <-- one note, two branches (a "clone")
//! ```
//!
//! Because the same note can sit under several parents (and, through a
//! branch cycle, even under itself) the hierarchy is a directed graph. The
//! export layer is responsible for projecting it onto a strict tree.
//!
//! ## Attributes and Links
//!
//! - **Labels** are plain name/value pairs (`#todo`, `#excludeFromExport`).
//! - **Relations** are attributes whose `value` is another note's id.
//! - **Links** are outgoing references found in the note content.
//!
//! Relations and links are the cross-references that may point outside an
//! exported subtree and therefore get filtered before the manifest ships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Identity of a note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (12 hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..12].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// Relation values are plain strings; this lets them be looked up directly.
impl Borrow<str> for NoteId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identity of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Branch ids are derived from the parent/child pair, so the same edge
    /// always gets the same id.
    pub fn for_edge(parent: &NoteId, child: &NoteId) -> Self {
        Self(format!("{}_{}", parent, child))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteType {
    Text,
    Code,
    File,
    Image,
    Search,
    RelationMap,
    Book,
    Render,
}

impl NoteType {
    pub fn default_mime(self) -> &'static str {
        match self {
            NoteType::Text => "text/html",
            NoteType::Code => "text/plain",
            NoteType::File => "application/octet-stream",
            NoteType::Image => "image/png",
            NoteType::Search | NoteType::RelationMap => "application/json",
            NoteType::Book | NoteType::Render => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeType {
    Label,
    Relation,
    LabelDefinition,
    RelationDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_inheritable: bool,
    #[serde(default)]
    pub position: i64,
}

impl Attribute {
    pub fn label(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attr_type: AttributeType::Label,
            name: name.into(),
            value: value.into(),
            is_inheritable: false,
            position: 0,
        }
    }

    pub fn relation(name: impl Into<String>, target: &NoteId) -> Self {
        Self {
            attr_type: AttributeType::Relation,
            name: name.into(),
            value: target.to_string(),
            is_inheritable: false,
            position: 0,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.attr_type == AttributeType::Relation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(rename = "type")]
    pub link_type: String,
    pub target_note_id: NoteId,
}

impl Link {
    pub fn new(link_type: impl Into<String>, target: &NoteId) -> Self {
        Self {
            link_type: link_type.into(),
            target_note_id: target.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub note_id: NoteId,
    pub title: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub mime: String,
    // Content lives in a separate file for the file store.
    #[serde(skip)]
    pub content: Vec<u8>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub links: Vec<Link>,
    pub date_modified: DateTime<Utc>,
}

impl Note {
    pub fn new(title: impl Into<String>, note_type: NoteType) -> Self {
        Self {
            note_id: NoteId::generate(),
            title: title.into(),
            note_type,
            mime: note_type.default_mime().to_string(),
            content: Vec::new(),
            attributes: Vec::new(),
            links: Vec::new(),
            date_modified: Utc::now(),
        }
    }

    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        let mut note = Self::new(title, NoteType::Text);
        note.content = content.into().into_bytes();
        note
    }

    pub fn with_id(mut self, id: impl Into<NoteId>) -> Self {
        self.note_id = id.into();
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Owned label lookup; inherited attributes are not considered.
    pub fn has_label(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.attr_type == AttributeType::Label && a.name == name)
    }

    pub fn content_as_text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub branch_id: BranchId,
    pub note_id: NoteId,
    pub parent_note_id: NoteId,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub note_position: i64,
    #[serde(default)]
    pub is_expanded: bool,
}

impl Branch {
    pub fn new(parent: &NoteId, child: &NoteId, note_position: i64) -> Self {
        Self {
            branch_id: BranchId::for_edge(parent, child),
            note_id: child.clone(),
            parent_note_id: parent.clone(),
            prefix: None,
            note_position,
            is_expanded: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The title shown for the note at this placement.
    pub fn display_title(&self, note_title: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{} - {}", prefix, note_title),
            _ => note_title.to_string(),
        }
    }
}
