#![allow(dead_code)]

use boardlink::device::{DeviceCommand, DeviceOutput, DeviceRequest};
use boardlink::i18n::MessageCatalog;
use boardlink::services::{BlockWorkspace, DeviceService, Dialogs, TextEditor};
use boardlink::{ParseError, Session, SessionOptions};

pub type TestSession = Session<FakeWorkspace, FakeEditor, FakeDevice, FakeDialogs>;

/// Block workspace where each non-blank line is a block. A line containing
/// `!!` does not parse. The saved form is the lines wrapped in `<xml>`.
#[derive(Debug, Default)]
pub struct FakeWorkspace {
    pub blocks: Vec<String>,
    pub visible: bool,
    pub clears: usize,
}

impl FakeWorkspace {
    pub fn with_blocks(blocks: &[&str]) -> Self {
        Self {
            blocks: blocks.iter().map(|b| b.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl BlockWorkspace for FakeWorkspace {
    type Program = Vec<String>;

    fn clear(&mut self) {
        self.blocks.clear();
        self.clears += 1;
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn to_text(&self) -> String {
        self.blocks.iter().map(|b| format!("{b}\n")).collect()
    }

    fn parse_text(&self, source: &str) -> Result<Self::Program, ParseError> {
        let mut out = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            if let Some(col) = line.find("!!") {
                return Err(ParseError::new(idx + 1, col + 1, "unexpected symbol"));
            }
            if !line.trim().is_empty() {
                out.push(line.to_string());
            }
        }
        Ok(out)
    }

    fn to_saved(&self) -> String {
        format!("<xml>{}</xml>", self.blocks.join("|"))
    }

    fn parse_saved(&self, saved: &str) -> Result<Self::Program, ParseError> {
        let inner = saved
            .strip_prefix("<xml>")
            .and_then(|s| s.strip_suffix("</xml>"))
            .ok_or_else(|| ParseError::new(1, 1, "not a saved block program"))?;
        Ok(inner
            .split('|')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn load_program(&mut self, program: Self::Program) {
        self.blocks.extend(program);
    }
}

#[derive(Debug, Default)]
pub struct FakeEditor {
    pub text: String,
    pub focus_count: usize,
    pub writes: usize,
}

impl TextEditor for FakeEditor {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.writes += 1;
    }

    fn focus(&mut self) {
        self.focus_count += 1;
    }
}

/// Holds submitted requests so tests decide when and how they complete.
#[derive(Debug, Default)]
pub struct FakeDevice {
    pub requests: Vec<DeviceRequest>,
}

impl FakeDevice {
    pub fn take(&mut self) -> Vec<DeviceRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.requests.iter().map(|r| r.command.clone()).collect()
    }
}

impl DeviceService for FakeDevice {
    fn submit(&mut self, request: DeviceRequest) {
        self.requests.push(request);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogCall {
    ShowProgress(String),
    HideProgress,
    Info(String),
    Alert(String),
    Confirm(String),
    OpenUpgrade(String, u8),
    UpdateUpgrade(u8),
}

#[derive(Debug)]
pub struct FakeDialogs {
    pub calls: Vec<DialogCall>,
    pub answer: bool,
    pub progress_visible: bool,
}

impl Default for FakeDialogs {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            answer: true,
            progress_visible: false,
        }
    }
}

impl FakeDialogs {
    pub fn alerts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DialogCall::Alert(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DialogCall::Info(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Dialogs for FakeDialogs {
    fn show_progress(&mut self, title: &str) {
        self.progress_visible = true;
        self.calls.push(DialogCall::ShowProgress(title.to_string()));
    }

    fn hide_progress(&mut self) {
        self.progress_visible = false;
        self.calls.push(DialogCall::HideProgress);
    }

    fn show_info(&mut self, message: &str, _auto_dismiss_ms: u64) {
        self.calls.push(DialogCall::Info(message.to_string()));
    }

    fn show_alert(&mut self, message: &str) {
        self.calls.push(DialogCall::Alert(message.to_string()));
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.calls.push(DialogCall::Confirm(message.to_string()));
        self.answer
    }

    fn open_upgrade_progress(&mut self, title: &str, percent: u8) {
        self.calls.push(DialogCall::OpenUpgrade(title.to_string(), percent));
    }

    fn update_upgrade_progress(&mut self, percent: u8) {
        self.calls.push(DialogCall::UpdateUpgrade(percent));
    }
}

pub fn session_with(workspace: FakeWorkspace, linked: bool) -> TestSession {
    let options = SessionOptions {
        linked,
        ..SessionOptions::default()
    };
    Session::new(
        workspace,
        FakeEditor::default(),
        FakeDevice::default(),
        FakeDialogs::default(),
        MessageCatalog::english(),
        options,
    )
}

/// Unlinked, connected session with an empty workspace.
pub fn connected_session() -> TestSession {
    let mut session = session_with(FakeWorkspace::default(), false);
    session.on_board_connected("ttyUSB0");
    session.dialogs_mut().calls.clear();
    session
}

/// Completes every outstanding request with the output `respond` picks.
pub fn complete_all(
    session: &mut TestSession,
    mut respond: impl FnMut(&DeviceCommand) -> DeviceOutput,
) -> usize {
    let requests = session.device_mut().take();
    let count = requests.len();
    for request in requests {
        let output = respond(&request.command);
        request.reply.ok(output);
    }
    session.poll_device_events();
    count
}
