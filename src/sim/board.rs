use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::device::{DeviceCommand, DeviceOutput, DeviceRequest};
use crate::error::DeviceError;
use crate::model::DirEntry;
use crate::services::DeviceService;

const UPGRADE_STEP_DELAY: Duration = Duration::from_millis(20);
const UPGRADE_STEPS: u8 = 10;
const FIRMWARE_DIR: &str = ".firmware";

/// A board whose filesystem is a local directory. Requests are served in
/// order by a worker thread; completions go back through each request's reply.
pub struct LocalBoard {
    tx: Option<Sender<DeviceRequest>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LocalBoard {
    pub fn start(root: PathBuf) -> Result<Self> {
        let (tx, rx) = unbounded::<DeviceRequest>();
        let handle = thread::Builder::new()
            .name("boardlink-local-board".to_string())
            .spawn(move || worker(&root, &rx))
            .context("failed to start local board worker")?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }
}

impl DeviceService for LocalBoard {
    fn submit(&mut self, request: DeviceRequest) {
        let Some(tx) = self.tx.as_ref() else {
            request.reply.finish(Err(DeviceError::Disconnected));
            return;
        };
        if let Err(err) = tx.send(request) {
            err.0.reply.finish(Err(DeviceError::Disconnected));
        }
    }
}

impl Drop for LocalBoard {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn worker(root: &Path, rx: &Receiver<DeviceRequest>) {
    info!(root = %root.display(), "local board worker started");
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            warn!("failed to create async runtime: {err}");
            for request in rx {
                request.reply.fail(format!("board runtime unavailable: {err}"));
            }
            return;
        }
    };

    for request in rx {
        let DeviceRequest {
            request_id,
            port,
            command,
            reply,
        } = request;
        debug!(request_id, %port, command = command.name(), "local board request");
        let result = rt.block_on(serve(root, command, |percent| reply.progress(percent)));
        if let Err(err) = &result {
            debug!(request_id, "local board request failed: {err}");
        }
        reply.finish(result.map_err(|err| DeviceError::Failed(format!("{err:#}"))));
    }
    info!("local board worker stopped");
}

async fn serve(
    root: &Path,
    command: DeviceCommand,
    progress: impl Fn(u8),
) -> Result<DeviceOutput> {
    match command {
        DeviceCommand::ListDirectory { path } => {
            let dir = resolve(root, &path)?;
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("cannot list {path}"))?;
            let mut entries = Vec::new();
            while let Some(entry) = reader.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let is_dir = entry.file_type().await?.is_dir();
                entries.push(if is_dir {
                    DirEntry::directory(name)
                } else {
                    DirEntry::file(name)
                });
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(DeviceOutput::Listing(entries))
        }
        DeviceCommand::ReceiveFile { path } => {
            let file = resolve(root, &path)?;
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("cannot read {path}"))?;
            Ok(DeviceOutput::Contents(contents))
        }
        DeviceCommand::Run { path, code } => {
            let file = resolve(root, &path)?;
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&file, code.as_bytes())
                .await
                .with_context(|| format!("cannot write {path}"))?;
            info!(%path, bytes = code.len(), "program stored and started");
            Ok(DeviceOutput::Done)
        }
        DeviceCommand::Stop => {
            info!("program stopped");
            Ok(DeviceOutput::Done)
        }
        DeviceCommand::Reboot => {
            info!("board rebooted");
            Ok(DeviceOutput::Done)
        }
        DeviceCommand::Console { line } => {
            info!(%line, "console line");
            Ok(DeviceOutput::Done)
        }
        DeviceCommand::UpgradeFirmware { image } => {
            for step in 1..=UPGRADE_STEPS {
                tokio::time::sleep(UPGRADE_STEP_DELAY).await;
                progress(step * (100 / UPGRADE_STEPS));
            }
            // One file per segment, named by its start address.
            let dir = root.join(FIRMWARE_DIR);
            tokio::fs::create_dir_all(&dir).await?;
            for segment in image.segments() {
                tokio::fs::write(dir.join(format!("{:08x}.bin", segment.address)), &segment.data)
                    .await
                    .context("cannot store firmware image")?;
            }
            Ok(DeviceOutput::Done)
        }
        DeviceCommand::QueryIdentity => Ok(DeviceOutput::Identity(format!(
            "local-board ({})",
            root.display()
        ))),
    }
}

/// Maps an absolute device path onto the served directory.
fn resolve(root: &Path, device_path: &str) -> Result<PathBuf> {
    let relative = Path::new(device_path.trim_start_matches('/'));
    let mut out = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(anyhow!("path escapes the board filesystem: {device_path}")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceEventKind, Dispatcher, Pending};

    fn finished(dispatcher: &Dispatcher<LocalBoard>) -> Result<DeviceOutput, DeviceError> {
        loop {
            let event = dispatcher
                .wait_event(Duration::from_secs(5))
                .expect("board reply");
            if let DeviceEventKind::Finished(result) = event.kind {
                return result;
            }
        }
    }

    #[test]
    fn resolve_rejects_parent_components() {
        let root = Path::new("/srv/board");
        assert_eq!(resolve(root, "/sd/lib").unwrap(), root.join("sd").join("lib"));
        assert_eq!(resolve(root, "").unwrap(), root);
        assert!(resolve(root, "/sd/../../etc").is_err());
    }

    #[test]
    fn lists_and_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sd/lib")).unwrap();
        std::fs::write(dir.path().join("sd/a.lua"), "print(1)").unwrap();

        let mut dispatcher = Dispatcher::new(LocalBoard::start(dir.path().to_path_buf()).unwrap());
        dispatcher.set_port(Some("local".to_string()));

        dispatcher
            .submit(
                DeviceCommand::ListDirectory { path: "/sd".into() },
                Pending::Listing { path: "/sd".into() },
            )
            .unwrap();
        assert_eq!(
            finished(&dispatcher),
            Ok(DeviceOutput::Listing(vec![
                DirEntry::file("a.lua"),
                DirEntry::directory("lib")
            ]))
        );

        dispatcher
            .submit(
                DeviceCommand::ReceiveFile { path: "/sd/a.lua".into() },
                Pending::Download {
                    file: crate::model::FileIdentity::new("/sd", "a.lua"),
                },
            )
            .unwrap();
        assert_eq!(
            finished(&dispatcher),
            Ok(DeviceOutput::Contents("print(1)".to_string()))
        );
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(LocalBoard::start(dir.path().to_path_buf()).unwrap());
        dispatcher.set_port(Some("local".to_string()));
        dispatcher
            .submit(
                DeviceCommand::ListDirectory { path: "/nope".into() },
                Pending::Listing { path: "/nope".into() },
            )
            .unwrap();
        assert!(matches!(finished(&dispatcher), Err(DeviceError::Failed(_))));
    }
}
