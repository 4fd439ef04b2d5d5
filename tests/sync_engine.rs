mod common;

use boardlink::i18n::MessageCatalog;
use boardlink::services::TextEditor;
use boardlink::sync::Conversion;
use boardlink::{FileIdentity, Pane, Session, SessionOptions};
use common::{session_with, FakeDevice, FakeDialogs, FakeEditor, FakeWorkspace, TestSession};

fn split_identities(blocks: &[&str], linked: bool) -> TestSession {
    Session::new(
        FakeWorkspace::with_blocks(blocks),
        FakeEditor::default(),
        FakeDevice::default(),
        FakeDialogs::default(),
        MessageCatalog::english(),
        SessionOptions {
            blocks_file: FileIdentity::new("/sd", "blink.lua"),
            editor_file: FileIdentity::new("/sd/lib", "other.lua"),
            linked,
            ..SessionOptions::default()
        },
    )
}

#[test]
fn linked_blocks_to_text_serializes_and_copies_identity() {
    let mut session = split_identities(&["led.on()", "wait(1)"], true);
    session.activate(Pane::Text).unwrap();

    assert_eq!(session.editor().text, "led.on()\nwait(1)\n");
    assert_eq!(session.files().editor, FileIdentity::new("/sd", "blink.lua"));
    assert_eq!(session.sync_engine().last_conversion(), Some(Conversion::BlocksToText));
    assert_eq!(session.sync_engine().conversion_count(), 1);
    assert_eq!(session.editor().focus_count, 1);
}

#[test]
fn opening_text_over_blocks_copies_identity_even_unlinked() {
    let mut session = split_identities(&["a()"], false);
    session.activate(Pane::Text).unwrap();
    assert_eq!(session.files().editor, session.files().blocks);
    assert_eq!(session.editor().writes, 0);
}

#[test]
fn unlinked_switches_never_touch_program_content() {
    let mut session = split_identities(&["a()"], false);
    session.activate(Pane::Text).unwrap();
    session.editor_mut().set_text("different()");
    session.activate(Pane::Blocks).unwrap();
    session.activate(Pane::Board).unwrap();
    session.activate(Pane::Blocks).unwrap();

    assert_eq!(session.workspace().blocks, vec!["a()"]);
    assert_eq!(session.workspace().clears, 0);
    assert_eq!(session.editor().text, "different()");
    assert_eq!(session.sync_engine().conversion_count(), 0);
}

#[test]
fn empty_workspace_does_not_overwrite_text() {
    let mut session = split_identities(&[], true);
    session.editor_mut().set_text("print(1)");
    session.activate(Pane::Text).unwrap();

    assert_eq!(session.editor().text, "print(1)");
    assert_eq!(session.files().editor, FileIdentity::new("/sd/lib", "other.lua"));
}

#[test]
fn linked_text_to_blocks_replaces_workspace() {
    let mut session = split_identities(&["old()"], true);
    session.activate(Pane::Text).unwrap();
    session.editor_mut().set_text("x = 1\n\nprint(x)\n");
    session.activate(Pane::Blocks).unwrap();

    assert_eq!(session.workspace().blocks, vec!["x = 1", "print(x)"]);
    assert_eq!(session.sync_engine().last_conversion(), Some(Conversion::TextToBlocks));
}

#[test]
fn parse_error_leaves_workspace_and_still_switches() {
    let mut session = split_identities(&["keep()"], true);
    session.activate(Pane::Text).unwrap();
    session.editor_mut().set_text("ok()\nbad !! line\n");

    let err = session.activate(Pane::Blocks).unwrap_err();
    assert_eq!((err.line, err.column), (2, 5));
    assert_eq!(session.active_pane(), Pane::Blocks);
    assert_eq!(session.workspace().blocks, vec!["keep()"]);
    assert_eq!(session.workspace().clears, 0);
    assert_eq!(
        session.dialogs().alerts(),
        vec!["Program error:\n line 2, column 5: unexpected symbol"]
    );
}

#[test]
fn round_trip_through_text_is_stable() {
    let mut session = session_with(FakeWorkspace::with_blocks(&["a()", "b()"]), true);
    for _ in 0..3 {
        session.activate(Pane::Text).unwrap();
        assert_eq!(session.editor().text, "a()\nb()\n");
        session.activate(Pane::Blocks).unwrap();
        assert_eq!(session.workspace().blocks, vec!["a()", "b()"]);
    }
}

#[test]
fn leaving_blocks_for_board_refreshes_text_when_linked() {
    let mut session = split_identities(&["led.on()"], true);
    session.on_board_connected("ttyUSB0");
    session.activate(Pane::Board).unwrap();
    assert_eq!(session.editor().text, "led.on()\n");
}

#[test]
fn workspace_edits_refresh_text_only_when_linked() {
    let mut session = split_identities(&[], false);
    session.workspace_mut().blocks.push("a()".to_string());
    session.on_workspace_changed();
    assert_eq!(session.editor().writes, 0);
    assert_eq!(session.files().editor, FileIdentity::new("/sd", "blink.lua"));

    session.toggle_linked();
    session.workspace_mut().blocks.push("b()".to_string());
    session.on_workspace_changed();
    assert_eq!(session.editor().text, "a()\nb()\n");
}

#[test]
fn labels_follow_identities() {
    let mut session = split_identities(&["a()"], false);
    assert_eq!(session.view(Pane::Text).label, "Lua /sd/lib/other.lua");
    session.activate(Pane::Text).unwrap();
    assert_eq!(session.view(Pane::Text).label, "Lua /sd/blink.lua");
    assert_eq!(session.view(Pane::Blocks).label, "Blocks /sd/blink.lua");
}
