//! Stand-in collaborators for running the session without real hardware:
//! a board backed by a local directory, a line-per-block workspace, a text
//! buffer and console dialogs.

mod board;
mod console;
mod editors;

pub use board::LocalBoard;
pub use console::ConsoleDialogs;
pub use editors::{LineWorkspace, TextBuffer};
