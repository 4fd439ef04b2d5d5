use std::fmt;

use serde::{Deserialize, Serialize};

/// The (location, name) pair a pane currently represents.
///
/// Each pane owns its own slot. Copying one identity onto another is always a
/// value copy; later edits to one slot never show through the other.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub name: String,
}

impl FileIdentity {
    pub fn new(location: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_empty() && self.name.is_empty()
    }

    pub fn clear(&mut self) {
        self.location.clear();
        self.name.clear();
    }

    /// Destination path on the device: `location + '/' + name`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.location, self.name)
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.name)
    }
}

/// One of the three mutually exclusive views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pane {
    Blocks,
    Text,
    Board,
}

impl Pane {
    pub const ALL: [Pane; 3] = [Pane::Blocks, Pane::Text, Pane::Board];

    pub fn index(self) -> usize {
        match self {
            Pane::Blocks => 0,
            Pane::Text => 1,
            Pane::Board => 2,
        }
    }

    /// Message catalog key for the pane's tab label.
    pub fn label_key(self) -> &'static str {
        match self {
            Pane::Blocks => "blocks",
            Pane::Text => "editor",
            Pane::Board => "board",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "blocks" => Some(Self::Blocks),
            "text" | "editor" | "code" => Some(Self::Text),
            "board" => Some(Self::Board),
            _ => None,
        }
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pane::Blocks => "blocks",
            Pane::Text => "text",
            Pane::Board => "board",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One entry of a remote directory listing, in device order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Which actions a renderer should offer right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Enablement {
    pub link: bool,
    pub discard: bool,
    pub load: bool,
    pub save: bool,
    pub run: bool,
    pub stop: bool,
    pub reboot: bool,
    pub upgrade: bool,
    pub board_tab: bool,
    pub board_content: bool,
}

/// Visual state of one pane's tab and content region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaneView {
    pub active: bool,
    pub visible: bool,
    pub label: String,
}
