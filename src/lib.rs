//! Session controller for a block/text programming environment talking to a
//! microcontroller board.
//!
//! A [`Session`] keeps the visual block program and its text source in step
//! when linked, browses the board's filesystem lazily through a
//! [`RemoteBrowser`], and dispatches run/stop/reboot/upgrade commands over a
//! request/result channel. Editors, the device transport and dialogs are
//! supplied by the host through the traits in [`services`].

pub mod async_config;
pub mod browser;
pub mod config;
pub mod device;
pub mod error;
pub mod firmware;
pub mod i18n;
pub mod logger;
pub mod model;
pub mod services;
pub mod session;
pub mod sim;
pub mod sync;
pub mod tree;

pub use browser::RemoteBrowser;
pub use error::{ConfigError, DeviceError, FirmwareError, ParseError};
pub use model::{DirEntry, Enablement, EntryKind, FileIdentity, Pane, PaneView};
pub use session::{SavedProgram, Session, SessionOptions};
pub use sync::{FileSlots, SyncEngine};
pub use tree::{DirectoryTree, TreeClick};
