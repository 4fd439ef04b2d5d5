//! Remote board browser: drives the directory tree against the device.

use tracing::{debug, info, warn};

use crate::device::{DeviceCommand, Dispatcher, Pending, RequestId};
use crate::error::DeviceError;
use crate::i18n::MessageCatalog;
use crate::model::{DirEntry, FileIdentity};
use crate::services::{DeviceService, Dialogs};
use crate::tree::{DirectoryTree, TreeClick};

#[derive(Debug, Default)]
pub struct RemoteBrowser {
    tree: DirectoryTree,
}

impl RemoteBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Starts over at `root`, dropping everything materialized so far.
    pub fn reset(&mut self, root: &str) {
        self.tree.reset(root);
    }

    /// Lists `path` again and re-renders its entries when the listing lands.
    pub fn refresh<D, U>(
        &mut self,
        path: &str,
        dispatcher: &mut Dispatcher<D>,
        dialogs: &mut U,
        messages: &MessageCatalog,
    ) -> Option<RequestId>
    where
        D: DeviceService,
        U: Dialogs + ?Sized,
    {
        if !self.tree.begin_listing(path) {
            debug!(path, "refresh of unknown directory ignored");
            return None;
        }
        self.request_listing(path, dispatcher, dialogs, messages)
    }

    /// Handles a click that hit the node at `path`.
    pub fn click<D, U>(
        &mut self,
        path: &str,
        board_file: &mut FileIdentity,
        editor_file: &mut FileIdentity,
        dispatcher: &mut Dispatcher<D>,
        dialogs: &mut U,
        messages: &MessageCatalog,
    ) -> TreeClick
    where
        D: DeviceService,
        U: Dialogs + ?Sized,
    {
        let click = self.tree.click(path);
        match &click {
            TreeClick::Expand { path } => {
                info!(%path, "expanding directory");
                board_file.location.clone_from(path);
                self.request_listing(path, dispatcher, dialogs, messages);
            }
            TreeClick::Collapse { path } => {
                info!(%path, "collapsed directory");
            }
            TreeClick::OpenFile(file) => {
                info!(path = %file.path(), "opening board file");
                *board_file = file.clone();
                *editor_file = file.clone();
                dialogs.show_progress(&format!(
                    "{} {} ...",
                    messages.lookup("downloadingFile"),
                    file.path()
                ));
                let submitted = dispatcher.submit(
                    DeviceCommand::ReceiveFile { path: file.path() },
                    Pending::Download { file: file.clone() },
                );
                if submitted.is_err() {
                    dialogs.hide_progress();
                }
            }
            TreeClick::Missing => debug!(path, "click on unknown node"),
        }
        click
    }

    /// Applies a finished listing. Failures leave the tree as it was before
    /// the request, apart from a first expansion falling back to collapsed.
    pub fn listing_finished<U>(
        &mut self,
        path: &str,
        result: Result<Vec<DirEntry>, DeviceError>,
        dialogs: &mut U,
    ) -> Result<(), DeviceError>
    where
        U: Dialogs + ?Sized,
    {
        dialogs.hide_progress();
        match result {
            Ok(entries) => {
                if self.tree.apply_listing(path, &entries) {
                    debug!(path, entries = entries.len(), "directory listed");
                }
                Ok(())
            }
            Err(err) => {
                warn!(path, "directory listing failed: {err}");
                self.tree.fail_listing(path);
                Err(err)
            }
        }
    }

    fn request_listing<D, U>(
        &mut self,
        path: &str,
        dispatcher: &mut Dispatcher<D>,
        dialogs: &mut U,
        messages: &MessageCatalog,
    ) -> Option<RequestId>
    where
        D: DeviceService,
        U: Dialogs + ?Sized,
    {
        dialogs.show_progress(&messages.lookup("retrievingDirectory"));
        match dispatcher.submit(
            DeviceCommand::ListDirectory {
                path: path.to_string(),
            },
            Pending::Listing {
                path: path.to_string(),
            },
        ) {
            Ok(request_id) => Some(request_id),
            Err(_) => {
                dialogs.hide_progress();
                self.tree.fail_listing(path);
                None
            }
        }
    }
}
