//! The session controller: active pane, linking, file identities, action
//! enablement and device command dispatch.
//!
//! All state is owned here and mutated only from the thread that calls into
//! the session. Device completions are queued on a channel by the transport
//! and applied when the owner calls [`Session::poll_device_events`].

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::RemoteBrowser;
use crate::config::{AppConfig, PersistedSession};
use crate::device::{
    DeviceCommand, DeviceEvent, DeviceEventKind, DeviceOutput, Dispatcher, Pending, RequestId,
};
use crate::error::{DeviceError, FirmwareError, ParseError};
use crate::firmware::FirmwareImage;
use crate::i18n::MessageCatalog;
use crate::model::{Enablement, FileIdentity, Pane, PaneView};
use crate::services::{BlockWorkspace, DeviceService, Dialogs, TextEditor};
use crate::sync::{EntryCause, FileSlots, SyncEngine, Transition};
use crate::tree::{DirectoryTree, TreeClick};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub blocks_file: FileIdentity,
    pub editor_file: FileIdentity,
    pub linked: bool,
    pub notify_device_errors: bool,
    pub info_dismiss_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            blocks_file: cfg
                .session
                .blocks_file
                .clone()
                .unwrap_or_else(|| cfg.default_file.clone()),
            editor_file: cfg
                .session
                .editor_file
                .clone()
                .unwrap_or_else(|| cfg.default_file.clone()),
            linked: cfg.session.linked,
            notify_device_errors: cfg.notify_device_errors,
            info_dismiss_ms: cfg.info_dismiss_ms,
        }
    }
}

/// A program ready to be written somewhere by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedProgram {
    pub suggested_name: String,
    pub contents: String,
}

pub struct Session<W, E, D, U>
where
    W: BlockWorkspace,
    E: TextEditor,
    D: DeviceService,
    U: Dialogs,
{
    workspace: W,
    editor: E,
    dispatcher: Dispatcher<D>,
    dialogs: U,
    messages: MessageCatalog,
    sync: SyncEngine,
    browser: RemoteBrowser,
    files: FileSlots,
    active: Pane,
    linked: bool,
    progress_dialog_open: bool,
    views: [PaneView; 3],
    enablement: Enablement,
    board_identity: Option<String>,
    last_device_error: Option<DeviceError>,
    notify_device_errors: bool,
    info_dismiss_ms: u64,
}

impl<W, E, D, U> Session<W, E, D, U>
where
    W: BlockWorkspace,
    E: TextEditor,
    D: DeviceService,
    U: Dialogs,
{
    pub fn new(
        workspace: W,
        editor: E,
        device: D,
        dialogs: U,
        messages: MessageCatalog,
        options: SessionOptions,
    ) -> Self {
        let mut session = Self {
            workspace,
            editor,
            dispatcher: Dispatcher::new(device),
            dialogs,
            messages,
            sync: SyncEngine::new(),
            browser: RemoteBrowser::new(),
            files: FileSlots {
                board: FileIdentity::default(),
                blocks: options.blocks_file,
                editor: options.editor_file,
            },
            active: Pane::Blocks,
            linked: options.linked,
            progress_dialog_open: false,
            views: Default::default(),
            enablement: Enablement::default(),
            board_identity: None,
            last_device_error: None,
            notify_device_errors: options.notify_device_errors,
            info_dismiss_ms: options.info_dismiss_ms,
        };
        session.views[Pane::Blocks.index()].active = true;
        session.views[Pane::Blocks.index()].visible = true;
        session.workspace.set_visible(true);
        session.recompute_enablement();
        session.refresh_labels();
        session
    }

    pub fn active_pane(&self) -> Pane {
        self.active
    }

    pub fn linked(&self) -> bool {
        self.linked
    }

    pub fn is_connected(&self) -> bool {
        self.dispatcher.port().is_some()
    }

    pub fn port(&self) -> Option<&str> {
        self.dispatcher.port()
    }

    pub fn files(&self) -> &FileSlots {
        &self.files
    }

    pub fn view(&self, pane: Pane) -> &PaneView {
        &self.views[pane.index()]
    }

    pub fn enablement(&self) -> Enablement {
        self.enablement
    }

    pub fn progress_dialog_open(&self) -> bool {
        self.progress_dialog_open
    }

    pub fn board_identity(&self) -> Option<&str> {
        self.board_identity.as_deref()
    }

    pub fn last_device_error(&self) -> Option<&DeviceError> {
        self.last_device_error.as_ref()
    }

    pub fn pending_requests(&self) -> usize {
        self.dispatcher.pending_count()
    }

    pub fn tree(&self) -> &DirectoryTree {
        self.browser.tree()
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut W {
        &mut self.workspace
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn device(&self) -> &D {
        self.dispatcher.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.dispatcher.device_mut()
    }

    pub fn dialogs(&self) -> &U {
        &self.dialogs
    }

    pub fn dialogs_mut(&mut self) -> &mut U {
        &mut self.dialogs
    }

    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            linked: self.linked,
            blocks_file: Some(self.files.blocks.clone()),
            editor_file: Some(self.files.editor.clone()),
        }
    }

    /// Switches the active pane.
    ///
    /// Re-activating the current pane is an idempotent refresh. The switch
    /// always completes; a failed text to blocks conversion is shown to the
    /// user and returned. The board pane is only reachable while connected;
    /// activating it otherwise changes nothing.
    pub fn activate(&mut self, pane: Pane) -> Result<(), ParseError> {
        if pane == Pane::Board && !self.is_connected() {
            debug!("board pane unavailable without a connected board");
            return Ok(());
        }
        self.enter(pane, EntryCause::Navigation)
    }

    /// Flips linking. Nothing is converted until the next pane entry.
    pub fn toggle_linked(&mut self) -> bool {
        self.linked = !self.linked;
        info!(linked = self.linked, "linking toggled");
        self.linked
    }

    /// Edit-driven refresh after the block workspace changed.
    pub fn on_workspace_changed(&mut self) {
        self.sync.workspace_changed(
            self.active,
            self.linked,
            &self.workspace,
            &mut self.editor,
            &mut self.files,
        );
        self.refresh_labels();
    }

    /// Clears the active pane's program after confirmation. Returns whether
    /// anything was discarded; a declined confirmation changes nothing.
    pub fn discard(&mut self) -> bool {
        match self.active {
            Pane::Blocks => {
                let count = self.workspace.block_count();
                if count == 0 {
                    return false;
                }
                let question = self.messages.format1("DELETE_ALL_BLOCKS", count);
                if !self.dialogs.confirm(&question) {
                    return false;
                }
                info!(count, "discarding blocks");
                self.workspace.clear();
                self.on_workspace_changed();
                true
            }
            Pane::Text => {
                if !self.dialogs.confirm(&self.messages.lookup("DELETE_EDIT_CODE")) {
                    return false;
                }
                info!("discarding editor text");
                self.editor.set_text("");
                true
            }
            Pane::Board => false,
        }
    }

    /// Sends the active pane's program to the board and runs it.
    pub fn run(&mut self) -> Option<RequestId> {
        let (code, path) = match self.active {
            Pane::Blocks => (self.workspace.to_text(), self.files.blocks.path()),
            Pane::Text => (self.editor.text(), self.files.editor.path()),
            Pane::Board => {
                debug!("run ignored on the board pane");
                return None;
            }
        };
        self.dialogs.show_progress(&self.messages.lookup("sendingCode"));
        let request_id = self.dispatch(DeviceCommand::Run { path, code }, Pending::Run);
        if request_id.is_none() {
            self.dialogs.hide_progress();
        }
        request_id
    }

    pub fn stop(&mut self) -> Option<RequestId> {
        self.dispatch(DeviceCommand::Stop, Pending::Stop)
    }

    pub fn reboot(&mut self) -> Option<RequestId> {
        self.dispatch(DeviceCommand::Reboot, Pending::Reboot)
    }

    pub fn send_console_line(&mut self, line: &str) -> Option<RequestId> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        self.dispatch(
            DeviceCommand::Console {
                line: line.to_string(),
            },
            Pending::Console,
        )
    }

    /// Decodes an Intel HEX image and starts the upgrade. Decode errors are
    /// shown and returned; nothing is sent in that case.
    pub fn upgrade_firmware(&mut self, contents: &str) -> Result<Option<RequestId>, FirmwareError> {
        let image = match FirmwareImage::parse_intel_hex(contents) {
            Ok(image) => image,
            Err(err) => {
                warn!("firmware image rejected: {err}");
                self.dialogs.show_alert(&err.to_string());
                return Err(err);
            }
        };
        info!(
            bytes = image.len(),
            segments = image.segments().len(),
            base = format_args!("{:#010x}", image.base_address()),
            "upgrading firmware"
        );
        Ok(self.dispatch(DeviceCommand::UpgradeFirmware { image }, Pending::Upgrade))
    }

    /// Asks whether to upgrade a board that only runs its bootloader.
    pub fn on_board_in_bootloader(&mut self) -> bool {
        let answer = self
            .dialogs
            .confirm(&self.messages.lookup("boardInBootloaderMode"));
        info!(answer, "bootloader upgrade prompt answered");
        answer
    }

    pub fn on_board_connected(&mut self, port: impl Into<String>) {
        let port = port.into();
        info!(%port, "board connected");
        self.dispatcher.set_port(Some(port));
        self.dialogs
            .show_info(&self.messages.lookup("boardConnected"), self.info_dismiss_ms);
        self.recompute_enablement();
        self.refresh_labels();
    }

    pub fn on_board_disconnected(&mut self) {
        info!("board disconnected");
        self.dispatcher.set_port(None);
        self.dialogs
            .show_info(&self.messages.lookup("boardDisconnected"), self.info_dismiss_ms);
        if let Err(err) = self.activate(Pane::Blocks) {
            debug!("blocks conversion after disconnect failed: {err}");
        }
        self.recompute_enablement();
    }

    /// Delivers a click on the board tree node at `path`.
    pub fn click_board_node(&mut self, path: &str) -> TreeClick {
        if self.active != Pane::Board {
            debug!(path, "board click outside the board pane ignored");
            return TreeClick::Missing;
        }
        self.browser.click(
            path,
            &mut self.files.board,
            &mut self.files.editor,
            &mut self.dispatcher,
            &mut self.dialogs,
            &self.messages,
        )
    }

    /// Lists `path` again on the board pane.
    pub fn refresh_board(&mut self, path: &str) -> Option<RequestId> {
        if self.active != Pane::Board {
            return None;
        }
        self.browser
            .refresh(path, &mut self.dispatcher, &mut self.dialogs, &self.messages)
    }

    /// Active pane's program in its saved form.
    pub fn save(&self) -> Option<SavedProgram> {
        match self.active {
            Pane::Blocks => Some(SavedProgram {
                suggested_name: "untitled.xml".to_string(),
                contents: self.workspace.to_saved(),
            }),
            Pane::Text => Some(SavedProgram {
                suggested_name: "untitled.lua".to_string(),
                contents: self.editor.text(),
            }),
            Pane::Board => None,
        }
    }

    /// Loads a saved program into the active pane. A malformed saved
    /// program is shown and leaves the workspace untouched.
    pub fn load(&mut self, contents: &str) -> Result<(), ParseError> {
        match self.active {
            Pane::Blocks => {
                let program = match self.workspace.parse_saved(contents) {
                    Ok(program) => program,
                    Err(err) => {
                        warn!("saved program rejected: {err}");
                        self.dialogs.show_alert(&err.to_string());
                        return Err(err);
                    }
                };
                self.workspace.clear();
                self.workspace.load_program(program);
                self.on_workspace_changed();
            }
            Pane::Text => self.editor.set_text(contents),
            Pane::Board => debug!("load ignored on the board pane"),
        }
        Ok(())
    }

    /// Applies every completion queued so far. Returns how many were handled.
    pub fn poll_device_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.dispatcher.try_next_event() {
            self.handle_device_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for one completion, then drains the rest.
    pub fn wait_device_events(&mut self, timeout: Duration) -> usize {
        match self.dispatcher.wait_event(timeout) {
            Some(event) => {
                self.handle_device_event(event);
                1 + self.poll_device_events()
            }
            None => 0,
        }
    }

    fn enter(&mut self, pane: Pane, cause: EntryCause) -> Result<(), ParseError> {
        let from = self.active;
        if from == Pane::Blocks {
            self.workspace.set_visible(false);
        }
        for view in &mut self.views {
            view.active = false;
            view.visible = false;
        }
        self.active = pane;
        let view = &mut self.views[pane.index()];
        view.active = true;
        view.visible = true;
        info!(%from, to = %pane, ?cause, "pane activated");

        let result = self.sync.pane_entered(
            Transition {
                from,
                to: pane,
                cause,
            },
            self.linked,
            &mut self.workspace,
            &mut self.editor,
            &mut self.files,
        );
        if let Err(err) = &result {
            self.dialogs
                .show_alert(&self.messages.format1("badCode", err));
        }

        if pane == Pane::Board {
            self.files.board.clear();
            self.browser.reset(&self.files.board.location);
            let root = self.files.board.location.clone();
            self.browser
                .refresh(&root, &mut self.dispatcher, &mut self.dialogs, &self.messages);
        }

        self.recompute_enablement();
        self.refresh_labels();
        result
    }

    fn recompute_enablement(&mut self) {
        let editing = self.active != Pane::Board;
        let mut enablement = Enablement {
            link: editing,
            discard: editing,
            load: editing,
            save: editing,
            run: editing,
            stop: editing,
            reboot: editing,
            upgrade: false,
            board_tab: true,
            board_content: true,
        };
        if self.is_connected() {
            // Run/stop/reboot stay available while browsing the board.
            enablement.upgrade = !editing;
            enablement.run = true;
            enablement.stop = true;
            enablement.reboot = true;
        } else {
            enablement.run = false;
            enablement.stop = false;
            enablement.reboot = false;
            enablement.upgrade = false;
            enablement.board_tab = false;
            enablement.board_content = false;
        }
        self.enablement = enablement;
    }

    fn refresh_labels(&mut self) {
        for pane in Pane::ALL {
            let title = self.messages.lookup(pane.label_key());
            let label = match pane {
                Pane::Board => title,
                Pane::Blocks | Pane::Text => format!("{title} {}", self.files.get(pane)),
            };
            self.views[pane.index()].label = label;
        }
    }

    fn dispatch(&mut self, command: DeviceCommand, pending: Pending) -> Option<RequestId> {
        let name = command.name();
        match self.dispatcher.submit(command, pending) {
            Ok(request_id) => Some(request_id),
            Err(err) => {
                debug!(command = name, "command not dispatched: {err}");
                self.last_device_error = Some(err);
                None
            }
        }
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        let Some(pending) = self.dispatcher.resolve(&event) else {
            debug!(request_id = event.request_id, "stale device event dropped");
            return;
        };
        match event.kind {
            DeviceEventKind::Progress(percent) => {
                if pending == Pending::Upgrade {
                    self.upgrade_progress(percent);
                } else {
                    debug!(request_id = event.request_id, percent, "progress");
                }
            }
            DeviceEventKind::Finished(result) => {
                debug!(request_id = event.request_id, ok = result.is_ok(), "device command finished");
                self.finish(pending, result);
            }
        }
    }

    fn finish(&mut self, pending: Pending, result: Result<DeviceOutput, DeviceError>) {
        match pending {
            Pending::Run => {
                self.dialogs.hide_progress();
                if let Err(err) = result {
                    self.device_failed("run", err);
                }
            }
            Pending::Stop | Pending::Reboot | Pending::Console => {
                if let Err(err) = result {
                    self.device_failed("control", err);
                }
            }
            Pending::Listing { path } => {
                let entries = result.and_then(|output| match output {
                    DeviceOutput::Listing(entries) => Ok(entries),
                    other => Err(unexpected(&other)),
                });
                if let Err(err) = self
                    .browser
                    .listing_finished(&path, entries, &mut self.dialogs)
                {
                    self.device_failed("list-directory", err);
                }
            }
            Pending::Download { file } => {
                self.dialogs.hide_progress();
                match result {
                    Ok(DeviceOutput::Contents(contents)) => self.file_downloaded(file, &contents),
                    Ok(other) => self.device_failed("receive-file", unexpected(&other)),
                    Err(err) => self.device_failed("receive-file", err),
                }
            }
            Pending::Upgrade => {
                self.progress_dialog_open = false;
                self.dialogs.hide_progress();
                match result {
                    Ok(_) => self
                        .dialogs
                        .show_info(&self.messages.lookup("firmwareUpgraded"), self.info_dismiss_ms),
                    Err(err) => self.device_failed("upgrade-firmware", err),
                }
                self.dispatch(DeviceCommand::QueryIdentity, Pending::Identity);
            }
            Pending::Identity => match result {
                Ok(DeviceOutput::Identity(identity)) => {
                    info!(%identity, "board identified");
                    self.board_identity = Some(identity);
                }
                Ok(other) => self.device_failed("query-identity", unexpected(&other)),
                Err(err) => self.device_failed("query-identity", err),
            },
        }
    }

    fn file_downloaded(&mut self, file: FileIdentity, contents: &str) {
        info!(path = %file.path(), bytes = contents.len(), "board file loaded");
        self.editor.set_text(contents);
        self.files.editor = file;
        if let Err(err) = self.enter(Pane::Text, EntryCause::FileLoaded) {
            debug!("entering text after download failed: {err}");
        }
    }

    fn upgrade_progress(&mut self, percent: u8) {
        if self.progress_dialog_open {
            self.dialogs.update_upgrade_progress(percent);
        } else {
            self.progress_dialog_open = true;
            self.dialogs
                .open_upgrade_progress(&self.messages.lookup("upgradingFirmware"), percent);
        }
    }

    fn device_failed(&mut self, command: &str, err: DeviceError) {
        warn!(command, "device command failed: {err}");
        if self.notify_device_errors {
            self.dialogs.show_info(
                &self.messages.format1("deviceError", &err),
                self.info_dismiss_ms,
            );
        }
        self.last_device_error = Some(err);
    }
}

fn unexpected(output: &DeviceOutput) -> DeviceError {
    DeviceError::Failed(format!("unexpected reply from board: {output:?}"))
}
