//! Collaborators the session drives but does not implement.

use crate::device::DeviceRequest;
use crate::error::ParseError;

/// The visual block editor.
///
/// `Program` is the editor's structured program representation. Parsing is
/// split from materializing so a failed parse never touches the workspace.
pub trait BlockWorkspace {
    type Program;

    fn clear(&mut self);
    fn block_count(&self) -> usize;
    fn set_visible(&mut self, visible: bool);

    /// Serializes the workspace to text source.
    fn to_text(&self) -> String;
    fn parse_text(&self, source: &str) -> Result<Self::Program, ParseError>;

    /// Saved-program form (the editor owns the format).
    fn to_saved(&self) -> String;
    fn parse_saved(&self, saved: &str) -> Result<Self::Program, ParseError>;

    /// Adds the program's blocks to the workspace.
    fn load_program(&mut self, program: Self::Program);
}

pub trait TextEditor {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
    fn focus(&mut self);
}

/// Device transport. Implementations must not block; outcomes go through
/// `request.reply`.
pub trait DeviceService {
    fn submit(&mut self, request: DeviceRequest);
}

/// Modal, progress and notification surfaces.
pub trait Dialogs {
    fn show_progress(&mut self, title: &str);

    /// Hiding an already hidden indicator is a no-op.
    fn hide_progress(&mut self);

    fn show_info(&mut self, message: &str, auto_dismiss_ms: u64);
    fn show_alert(&mut self, message: &str);
    fn confirm(&mut self, message: &str) -> bool;

    fn open_upgrade_progress(&mut self, title: &str, percent: u8);
    fn update_upgrade_progress(&mut self, percent: u8);
}
