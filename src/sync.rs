//! Keeps the block and text representations coherent while linked.
//!
//! Conversion runs only on pane entry (or an explicit workspace-changed
//! refresh), one direction per transition, and replaces the target wholesale.

use tracing::{debug, info};

use crate::error::ParseError;
use crate::model::{FileIdentity, Pane};
use crate::services::{BlockWorkspace, TextEditor};

/// The three per-pane identity slots. Always copied by value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileSlots {
    pub board: FileIdentity,
    pub blocks: FileIdentity,
    pub editor: FileIdentity,
}

impl FileSlots {
    pub fn get(&self, pane: Pane) -> &FileIdentity {
        match pane {
            Pane::Blocks => &self.blocks,
            Pane::Text => &self.editor,
            Pane::Board => &self.board,
        }
    }
}

/// Why a pane is being entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryCause {
    Navigation,
    /// A file downloaded from the board was just put in the text buffer.
    FileLoaded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Pane,
    pub to: Pane,
    pub cause: EntryCause,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    TextToBlocks,
    BlocksToText,
}

#[derive(Debug, Default)]
pub struct SyncEngine {
    last_conversion: Option<Conversion>,
    conversions: usize,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_conversion(&self) -> Option<Conversion> {
        self.last_conversion
    }

    pub fn conversion_count(&self) -> usize {
        self.conversions
    }

    /// Runs on every pane entry.
    ///
    /// A text parse failure leaves the workspace untouched and is returned
    /// after the identity rule has been applied.
    pub fn pane_entered<W, E>(
        &mut self,
        transition: Transition,
        linked: bool,
        workspace: &mut W,
        editor: &mut E,
        files: &mut FileSlots,
    ) -> Result<(), ParseError>
    where
        W: BlockWorkspace,
        E: TextEditor,
    {
        let navigation = transition.cause == EntryCause::Navigation;
        let mut result = Ok(());

        match transition.to {
            Pane::Blocks => {
                workspace.set_visible(true);
                if linked && navigation {
                    result = self.text_to_blocks(workspace, editor);
                }
            }
            Pane::Text | Pane::Board => {
                if transition.to == Pane::Text {
                    editor.focus();
                }
                if linked
                    && navigation
                    && transition.from == Pane::Blocks
                    && workspace.block_count() > 0
                {
                    self.blocks_to_text(workspace, editor);
                }
            }
        }

        if navigation {
            copy_identity(workspace, files);
        }
        result
    }

    /// Edit-driven refresh after the workspace changed outside a pane switch.
    pub fn workspace_changed<W, E>(
        &mut self,
        active: Pane,
        linked: bool,
        workspace: &W,
        editor: &mut E,
        files: &mut FileSlots,
    ) where
        W: BlockWorkspace,
        E: TextEditor,
    {
        if active == Pane::Blocks && linked {
            self.blocks_to_text(workspace, editor);
        }
        copy_identity(workspace, files);
    }

    fn text_to_blocks<W, E>(&mut self, workspace: &mut W, editor: &E) -> Result<(), ParseError>
    where
        W: BlockWorkspace,
        E: TextEditor,
    {
        let source = editor.text();
        let program = workspace.parse_text(&source).map_err(|err| {
            info!("text to blocks conversion failed: {err}");
            err
        })?;
        workspace.clear();
        workspace.load_program(program);
        self.record(Conversion::TextToBlocks);
        debug!(blocks = workspace.block_count(), "converted text to blocks");
        Ok(())
    }

    fn blocks_to_text<W, E>(&mut self, workspace: &W, editor: &mut E)
    where
        W: BlockWorkspace,
        E: TextEditor,
    {
        let text = workspace.to_text();
        editor.set_text(&text);
        self.record(Conversion::BlocksToText);
        debug!(bytes = text.len(), "converted blocks to text");
    }

    fn record(&mut self, conversion: Conversion) {
        self.last_conversion = Some(conversion);
        self.conversions += 1;
    }
}

/// The text view carries the identity of whatever program exists as blocks.
fn copy_identity<W: BlockWorkspace>(workspace: &W, files: &mut FileSlots) {
    if workspace.block_count() > 0 && files.editor != files.blocks {
        files.editor = files.blocks.clone();
    }
}
