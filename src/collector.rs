//! Receiving side of the remote appender.
//!
//! [`read_record`] pulls one frame off a [`TransportChannel`] and decodes it.
//! [`CollectorServer`] runs an accept loop on a [`ListeningChannel`], giving
//! each connection its own thread that feeds decoded records into a sink
//! until the peer disconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::net::{ListeningChannel, NetError, TransportChannel, TransportError};
use crate::record_codec::{
    CodecError, DecodedRecord, FRAME_HEADER_SIZE, check_frame_len, read_from_buffer,
};
use crate::wire_buffer::WireBuffer;

/// Pause between accept polls while the listener is idle.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Read and decode the next frame from `channel`.
pub fn read_record(channel: &mut TransportChannel) -> Result<DecodedRecord, CollectError> {
    let mut header = WireBuffer::with_capacity(FRAME_HEADER_SIZE);
    channel.read(&mut header)?;
    let len = check_frame_len(header.read_u32())?;
    let mut payload = WireBuffer::with_capacity(len);
    channel.read(&mut payload)?;
    Ok(read_from_buffer(&mut payload)?)
}

/// Callback receiving every decoded record.
pub type RecordSink = Arc<dyn Fn(DecodedRecord) + Send + Sync>;

/// Background accept loop serving remote appenders.
pub struct CollectorServer {
    running: Arc<AtomicBool>,
    port: Option<u16>,
    acceptor: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CollectorServer {
    /// Serve `listener` on a new thread, passing records to `sink`.
    pub fn spawn(
        listener: ListeningChannel,
        sink: impl Fn(DecodedRecord) + Send + Sync + 'static,
    ) -> Result<Self, TransportError> {
        listener.set_nonblocking(true)?;
        let port = listener.local_port();
        let running = Arc::new(AtomicBool::new(true));
        let sink: RecordSink = Arc::new(sink);
        let flag = Arc::clone(&running);
        let acceptor = thread::Builder::new()
            .name("femto-collector".into())
            .spawn(move || accept_loop(listener, &flag, &sink))
            .map_err(|err| TransportError::Net(NetError::from_io(&err, "spawn")))?;
        Ok(Self {
            running,
            port,
            acceptor: Mutex::new(Some(acceptor)),
        })
    }

    /// Port the listener is bound to.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Connections already established are served until their peers
    /// disconnect.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.acceptor.lock().take()
            && handle.join().is_err()
        {
            warn!("CollectorServer: accept thread panicked");
        }
    }
}

impl Drop for CollectorServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(mut listener: ListeningChannel, running: &AtomicBool, sink: &RecordSink) {
    while running.load(Ordering::Acquire) {
        let channel = listener.accept();
        if !channel.is_open() {
            if let Some(err) = listener.take_last_error() {
                warn!("CollectorServer: accept failed: {err}");
            }
            thread::sleep(ACCEPT_POLL_INTERVAL);
            continue;
        }
        // Some platforms hand out accepted sockets in the listener's mode.
        if let Err(err) = channel.set_nonblocking(false) {
            warn!("CollectorServer: could not make connection blocking: {err}");
            continue;
        }
        let sink = Arc::clone(sink);
        let spawned = thread::Builder::new()
            .name("femto-collector-conn".into())
            .spawn(move || serve_connection(channel, &sink));
        if let Err(err) = spawned {
            warn!("CollectorServer: could not spawn connection thread: {err}");
        }
    }
    listener.close();
}

fn serve_connection(mut channel: TransportChannel, sink: &RecordSink) {
    let peer = channel.peer_addr();
    loop {
        match read_record(&mut channel) {
            Ok(record) => sink(record),
            Err(CollectError::Transport(TransportError::Disconnected)) => {
                debug!("CollectorServer: {peer:?} disconnected");
                break;
            }
            Err(err) => {
                warn!("CollectorServer: dropping connection from {peer:?}: {err}");
                break;
            }
        }
    }
    channel.close();
}
