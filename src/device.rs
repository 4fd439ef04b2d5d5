//! Request/result channel between the session and the device transport.
//!
//! Every dispatched command carries a [`Reply`] handle. The transport reports
//! progress and the final outcome through it; the session drains the shared
//! channel on its own thread and routes each event by request id.

use std::collections::HashMap;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::error::DeviceError;
use crate::firmware::FirmwareImage;
use crate::model::{DirEntry, FileIdentity};
use crate::services::DeviceService;

pub type RequestId = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCommand {
    Run { path: String, code: String },
    Stop,
    Reboot,
    ListDirectory { path: String },
    ReceiveFile { path: String },
    UpgradeFirmware { image: FirmwareImage },
    QueryIdentity,
    Console { line: String },
}

impl DeviceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::Run { .. } => "run",
            DeviceCommand::Stop => "stop",
            DeviceCommand::Reboot => "reboot",
            DeviceCommand::ListDirectory { .. } => "list-directory",
            DeviceCommand::ReceiveFile { .. } => "receive-file",
            DeviceCommand::UpgradeFirmware { .. } => "upgrade-firmware",
            DeviceCommand::QueryIdentity => "query-identity",
            DeviceCommand::Console { .. } => "console",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceOutput {
    Done,
    Listing(Vec<DirEntry>),
    Contents(String),
    Identity(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEventKind {
    Progress(u8),
    Finished(Result<DeviceOutput, DeviceError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub request_id: RequestId,
    pub kind: DeviceEventKind,
}

/// Completion handle handed to the transport with each request.
///
/// Cloneable so a transport can move it across threads; only the first
/// `finish` for an id is acted upon by the session.
#[derive(Debug, Clone)]
pub struct Reply {
    request_id: RequestId,
    tx: Sender<DeviceEvent>,
}

impl Reply {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn progress(&self, percent: u8) {
        self.send(DeviceEventKind::Progress(percent.min(100)));
    }

    pub fn finish(self, result: Result<DeviceOutput, DeviceError>) {
        self.send(DeviceEventKind::Finished(result));
    }

    pub fn ok(self, output: DeviceOutput) {
        self.finish(Ok(output));
    }

    pub fn fail(self, message: impl Into<String>) {
        self.finish(Err(DeviceError::Failed(message.into())));
    }

    fn send(&self, kind: DeviceEventKind) {
        // The receiver lives as long as the session; a send error only means
        // the session is gone.
        let _ = self.tx.send(DeviceEvent {
            request_id: self.request_id,
            kind,
        });
    }
}

#[derive(Debug)]
pub struct DeviceRequest {
    pub request_id: RequestId,
    pub port: String,
    pub command: DeviceCommand,
    pub reply: Reply,
}

/// What an in-flight request id was issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pending {
    Run,
    Stop,
    Reboot,
    Console,
    Listing { path: String },
    Download { file: FileIdentity },
    Upgrade,
    Identity,
}

/// Owns the transport, the current port and the table of in-flight requests.
pub struct Dispatcher<D> {
    device: D,
    port: Option<String>,
    next_request_id: RequestId,
    pending: HashMap<RequestId, Pending>,
    event_tx: Sender<DeviceEvent>,
    event_rx: Receiver<DeviceEvent>,
}

impl<D: DeviceService> Dispatcher<D> {
    pub fn new(device: D) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            device,
            port: None,
            next_request_id: 1,
            pending: HashMap::new(),
            event_tx,
            event_rx,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn set_port(&mut self, port: Option<String>) {
        self.port = port;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Hands `command` to the transport and remembers what it was for.
    pub fn submit(
        &mut self,
        command: DeviceCommand,
        pending: Pending,
    ) -> Result<RequestId, DeviceError> {
        let Some(port) = self.port.clone() else {
            warn!(command = command.name(), "dropping command, no board connected");
            return Err(DeviceError::NotConnected);
        };
        let request_id = self.alloc_request_id();
        debug!(request_id, command = command.name(), %port, "dispatching device command");
        self.pending.insert(request_id, pending);
        let reply = Reply {
            request_id,
            tx: self.event_tx.clone(),
        };
        self.device.submit(DeviceRequest {
            request_id,
            port,
            command,
            reply,
        });
        Ok(request_id)
    }

    pub fn try_next_event(&self) -> Option<DeviceEvent> {
        match self.event_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn wait_event(&self, timeout: Duration) -> Option<DeviceEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Looks up the purpose of an event's request id. Finished requests leave
    /// the table; progress keeps them in it. Unknown ids yield `None`.
    pub fn resolve(&mut self, event: &DeviceEvent) -> Option<Pending> {
        match event.kind {
            DeviceEventKind::Progress(_) => self.pending.get(&event.request_id).cloned(),
            DeviceEventKind::Finished(_) => self.pending.remove(&event.request_id),
        }
    }

    fn alloc_request_id(&mut self) -> RequestId {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.saturating_add(1).max(1);
        request_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        requests: Vec<DeviceRequest>,
    }

    impl DeviceService for Capture {
        fn submit(&mut self, request: DeviceRequest) {
            self.requests.push(request);
        }
    }

    #[test]
    fn submit_without_port_is_rejected() {
        let mut dispatcher = Dispatcher::new(Capture::default());
        let result = dispatcher.submit(DeviceCommand::Stop, Pending::Stop);
        assert_eq!(result, Err(DeviceError::NotConnected));
        assert!(dispatcher.device().requests.is_empty());
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn progress_keeps_request_pending_until_finished() {
        let mut dispatcher = Dispatcher::new(Capture::default());
        dispatcher.set_port(Some("ttyUSB0".to_string()));
        let id = dispatcher
            .submit(DeviceCommand::Reboot, Pending::Reboot)
            .unwrap();
        let request = dispatcher.device_mut().requests.pop().unwrap();
        assert_eq!(request.port, "ttyUSB0");

        request.reply.progress(150);
        let event = dispatcher.try_next_event().unwrap();
        assert_eq!(event.kind, DeviceEventKind::Progress(100));
        assert_eq!(dispatcher.resolve(&event), Some(Pending::Reboot));
        assert!(dispatcher.is_pending(id));

        request.reply.ok(DeviceOutput::Done);
        let event = dispatcher.try_next_event().unwrap();
        assert_eq!(dispatcher.resolve(&event), Some(Pending::Reboot));
        assert!(!dispatcher.is_pending(id));
        assert_eq!(dispatcher.resolve(&event), None);
    }

    #[test]
    fn request_ids_are_distinct() {
        let mut dispatcher = Dispatcher::new(Capture::default());
        dispatcher.set_port(Some("p".to_string()));
        let a = dispatcher.submit(DeviceCommand::Stop, Pending::Stop).unwrap();
        let b = dispatcher.submit(DeviceCommand::Stop, Pending::Stop).unwrap();
        assert_ne!(a, b);
        assert_eq!(dispatcher.pending_count(), 2);
    }
}
