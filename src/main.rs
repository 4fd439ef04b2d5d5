use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use boardlink::async_config::AsyncConfigSaver;
use boardlink::config::{self, AppConfig};
use boardlink::i18n::MessageCatalog;
use boardlink::logger;
use boardlink::services::{BlockWorkspace, TextEditor};
use boardlink::sim::{ConsoleDialogs, LineWorkspace, LocalBoard, TextBuffer};
use boardlink::{Pane, Session, SessionOptions};

type ConsoleSession = Session<LineWorkspace, TextBuffer, LocalBoard, ConsoleDialogs>;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "boardlink", version, about = "Block/text session for a board")]
struct Args {
    /// Config file (defaults to the per-user location).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory served as the board filesystem.
    #[arg(long)]
    board_root: Option<PathBuf>,

    /// UI language (en, ca, es).
    #[arg(long)]
    lang: Option<String>,

    /// Answer yes to every confirmation.
    #[arg(long)]
    yes: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = config::load(&config_path);
    if let Some(lang) = &args.lang {
        cfg.language = lang.clone();
    }
    if let Some(root) = &args.board_root {
        cfg.board_root = root.clone();
    }

    logger::init(&cfg.log)?;
    info!(version = env!("CARGO_PKG_VERSION"), config = %config_path.display(), "starting");

    let messages = MessageCatalog::load(&cfg.language, cfg.messages_dir.as_deref())
        .context("failed to load message catalog")?;
    fs::create_dir_all(&cfg.board_root)
        .with_context(|| format!("cannot create board root {}", cfg.board_root.display()))?;
    let board = LocalBoard::start(cfg.board_root.clone())?;
    let dialogs = if args.yes {
        ConsoleDialogs::assume(true)
    } else {
        ConsoleDialogs::default()
    };

    let mut session = Session::new(
        LineWorkspace::default(),
        TextBuffer::default(),
        board,
        dialogs,
        messages,
        SessionOptions::from_config(&cfg),
    );
    session.on_board_connected(cfg.port.clone());

    let saver = AsyncConfigSaver::new(config_path);
    let result = repl(&mut session, &mut cfg, &saver);
    saver.flush(Duration::from_secs(2));
    info!("exiting");
    result
}

fn repl(session: &mut ConsoleSession, cfg: &mut AppConfig, saver: &AsyncConfigSaver) -> Result<()> {
    print_status(session);
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}> ", session.active_pane());
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        let rest = rest.trim();
        match cmd {
            "quit" | "exit" => return Ok(()),
            "help" => print_help(),
            _ => {
                if let Err(err) = execute(session, cmd, rest) {
                    println!("error: {err:#}");
                }
            }
        }
        settle(session);

        let persisted = session.persisted();
        if persisted != cfg.session {
            cfg.session = persisted;
            saver.request_save(cfg.clone());
        }
    }
}

fn execute(session: &mut ConsoleSession, cmd: &str, rest: &str) -> Result<()> {
    match cmd {
        "tab" | "pane" => {
            let pane = Pane::parse(rest).with_context(|| format!("unknown pane '{rest}'"))?;
            if pane == Pane::Board && !session.enablement().board_tab {
                println!("board is not connected");
            } else {
                // Conversion errors were already shown as an alert.
                let _ = session.activate(pane);
            }
        }
        "link" => {
            let linked = session.toggle_linked();
            println!("linked: {linked}");
        }
        "block" => {
            session.workspace_mut().add_block(rest);
            session.on_workspace_changed();
        }
        "set" => {
            let text = rest.replace("\\n", "\n");
            session.editor_mut().set_text(&text);
        }
        "run" => {
            session.run();
        }
        "stop" => {
            session.stop();
        }
        "reboot" => {
            session.reboot();
        }
        "discard" => {
            session.discard();
        }
        "click" => {
            let click = session.click_board_node(rest);
            println!("{click:?}");
        }
        "refresh" => {
            let path = if rest.is_empty() {
                session.tree().root_path().to_string()
            } else {
                rest.to_string()
            };
            session.refresh_board(&path);
        }
        "tree" => print!("{}", session.tree().outline()),
        "show" => print_status(session),
        "console" => {
            session.send_console_line(rest);
        }
        "connect" => {
            let port = if rest.is_empty() { "local" } else { rest };
            session.on_board_connected(port);
        }
        "disconnect" => session.on_board_disconnected(),
        "bootloader" => {
            if session.on_board_in_bootloader() {
                println!("use 'upgrade <file.hex>' to flash the board");
            }
        }
        "upgrade" => {
            let hex = fs::read_to_string(rest).with_context(|| format!("cannot read {rest}"))?;
            session.upgrade_firmware(&hex)?;
        }
        "save" => match session.save() {
            Some(saved) => {
                let target = if rest.is_empty() {
                    saved.suggested_name.as_str()
                } else {
                    rest
                };
                fs::write(target, saved.contents.as_bytes())
                    .with_context(|| format!("cannot write {target}"))?;
                println!("saved {target}");
            }
            None => println!("nothing to save on this pane"),
        },
        "load" => {
            let contents =
                fs::read_to_string(rest).with_context(|| format!("cannot read {rest}"))?;
            session.load(&contents)?;
        }
        other => {
            warn!(command = other, "unknown console command");
            println!("unknown command '{other}', try 'help'");
        }
    }
    Ok(())
}

/// Applies device completions until nothing is in flight or the timeout hits.
fn settle(session: &mut ConsoleSession) {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while session.pending_requests() > 0 && Instant::now() < deadline {
        session.wait_device_events(POLL_INTERVAL);
    }
    session.poll_device_events();
}

fn print_status(session: &ConsoleSession) {
    for pane in Pane::ALL {
        let view = session.view(pane);
        let marker = if view.active { '*' } else { ' ' };
        println!("{marker} {}", view.label);
    }
    let e = session.enablement();
    println!(
        "link={} run={} stop={} reboot={} upgrade={} board={} | linked={} port={}",
        e.link,
        e.run,
        e.stop,
        e.reboot,
        e.upgrade,
        e.board_tab,
        session.linked(),
        session.port().unwrap_or("-"),
    );
    if let Some(identity) = session.board_identity() {
        println!("board: {identity}");
    }
    match session.active_pane() {
        Pane::Blocks => {
            for (idx, block) in session.workspace().lines().iter().enumerate() {
                println!("  [{}] {block}", idx + 1);
            }
            if session.workspace().block_count() == 0 {
                println!("  (no blocks)");
            }
        }
        Pane::Text => print!("{}", session.editor().text()),
        Pane::Board => print!("{}", session.tree().outline()),
    }
}

fn print_help() {
    println!(
        "\
tab <blocks|text|board>   switch pane
link                      toggle blocks/text linking
block <line>              add a block
set <text>                replace editor text (\\n for newlines)
run | stop | reboot       board control
discard                   clear the active pane
click <path>              expand/collapse a directory or open a file
refresh [path]            list a directory again
tree | show               print the board tree / session state
console <line>            send a console line
connect [port] | disconnect
bootloader                simulate a board stuck in its bootloader
upgrade <file.hex>        flash a firmware image
save [file] | load <file>
quit"
    );
}
