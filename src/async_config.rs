use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::config::{self, AppConfig};

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Writes the config from a background thread so the session never waits on
/// disk I/O. Bursts of updates within the debounce window collapse into one
/// write; `flush` and drop write whatever is still pending.
pub struct AsyncConfigSaver {
    tx: Sender<Msg>,
    handle: Option<thread::JoinHandle<()>>,
}

enum Msg {
    Save(Box<AppConfig>),
    Flush(Sender<()>),
    Shutdown,
}

impl AsyncConfigSaver {
    pub fn new(path: PathBuf) -> Self {
        let (tx, rx) = unbounded::<Msg>();
        let handle = thread::Builder::new()
            .name("boardlink-config-saver".to_string())
            .spawn(move || saver_thread(&path, &rx))
            .map_err(|err| warn!("config saver thread failed to start: {err}"))
            .ok();
        Self { tx, handle }
    }

    pub fn request_save(&self, cfg: AppConfig) {
        let _ = self.tx.send(Msg::Save(Box::new(cfg)));
    }

    /// Writes any pending save and waits for it, bounded by `timeout`.
    pub fn flush(&self, timeout: Duration) {
        let (ack_tx, ack_rx) = unbounded::<()>();
        if self.tx.send(Msg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv_timeout(timeout);
        }
    }
}

impl Drop for AsyncConfigSaver {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn write(path: &Path, pending: &mut Option<Box<AppConfig>>) {
    if let Some(cfg) = pending.take() {
        match config::save(path, &cfg) {
            Ok(()) => debug!(path = %path.display(), "config saved"),
            Err(err) => warn!("config save failed: {err}"),
        }
    }
}

fn saver_thread(path: &Path, rx: &Receiver<Msg>) {
    let mut pending: Option<Box<AppConfig>> = None;
    loop {
        let msg = if pending.is_some() {
            match rx.recv_timeout(DEBOUNCE) {
                Ok(msg) => msg,
                Err(RecvTimeoutError::Timeout) => {
                    write(path, &mut pending);
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    write(path, &mut pending);
                    return;
                }
            }
        } else {
            match rx.recv() {
                Ok(msg) => msg,
                Err(_) => return,
            }
        };

        match msg {
            Msg::Save(cfg) => pending = Some(cfg),
            Msg::Flush(ack) => {
                write(path, &mut pending);
                let _ = ack.send(());
            }
            Msg::Shutdown => {
                write(path, &mut pending);
                return;
            }
        }
    }
}
