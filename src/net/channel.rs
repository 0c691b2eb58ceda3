//! Connection-oriented channel carrying wire buffers between processes.
//!
//! A [`TransportChannel`] is either open or closed. Every failed read or
//! write closes it, so a stale descriptor is never reused; the owner decides
//! whether to reconnect. [`ListeningChannel`] is the accepting side.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use socket2::SockAddr;
use thiserror::Error;

use super::error::NetError;
use super::mapping::{AddressFamily, MsgFlags, Protocol, SocketType, mf_to_int};
use super::wrapper::{
    Socket, accept_on_socket, bind_socket, close_socket, connect_socket, create_socket,
    listen_on_socket, receive_from_socket, send_on_socket, set_no_delay, set_reuse_addr,
};
use crate::wire_buffer::WireBuffer;

/// Backlog passed to `listen`.
pub const LISTEN_BACKLOG: i32 = 10;

// Name lookups are serialized; some platform resolvers are not re-entrant.
static RESOLVER_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Errors returned by channel I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel was not open when the call was made.
    #[error("transport channel is closed")]
    Closed,
    /// The peer ended the stream.
    #[error("peer closed the connection")]
    Disconnected,
    #[error(transparent)]
    Net(#[from] NetError),
}

/// Resolve `host` to a single address, preferring IPv4.
pub fn resolve_host(host: &str, port: u16) -> Result<SocketAddr, NetError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    let candidates: Vec<SocketAddr> = {
        let _guard = RESOLVER_LOCK.lock();
        (host, port)
            .to_socket_addrs()
            .map_err(|e| NetError::from_io(&e, "getaddrinfo"))?
            .collect()
    };
    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| {
            NetError::from_io(
                &std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses for host"),
                "getaddrinfo",
            )
        })
}

fn family_of(addr: &SocketAddr) -> AddressFamily {
    match addr {
        SocketAddr::V4(_) => AddressFamily::Inet,
        SocketAddr::V6(_) => AddressFamily::Inet6,
    }
}

// Flags used for every send: suppress SIGPIPE where the platform lets us.
fn send_flags() -> MsgFlags {
    if mf_to_int(MsgFlags::NO_SIGNAL).is_ok() {
        MsgFlags::NO_SIGNAL
    } else {
        MsgFlags::empty()
    }
}

/// Stream connection to a remote peer.
#[derive(Debug, Default)]
pub struct TransportChannel {
    socket: Socket,
    last_error: Option<NetError>,
}

impl TransportChannel {
    /// A closed channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor that connects immediately.
    ///
    /// The returned channel is closed if the connection failed; inspect
    /// [`last_error`](Self::last_error) for the reason.
    pub fn connected(host: &str, port: u16) -> Self {
        let mut channel = Self::new();
        let _ = channel.connect(host, port);
        channel
    }

    pub(crate) fn from_socket(socket: Socket) -> Self {
        Self {
            socket,
            last_error: None,
        }
    }

    /// Connect to `host:port`, replacing any existing connection.
    ///
    /// On failure the error is recorded and the channel stays closed.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.close();
        match open_stream(host, port) {
            Ok(socket) => {
                self.socket = socket;
                self.last_error = None;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_open()
    }

    /// The most recent failure, if any.
    pub fn last_error(&self) -> Option<&NetError> {
        self.last_error.as_ref()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.peer_addr().ok().and_then(|addr| addr.as_socket())
    }

    /// Apply the same timeout to reads and writes.
    pub fn set_io_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.socket.set_read_timeout(timeout)?;
        self.socket.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Switch between blocking and non-blocking I/O.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.socket.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Fill `buffer`'s spare capacity from the stream.
    ///
    /// Loops until the buffer is full. End-of-stream or an error closes the
    /// channel.
    pub fn read(&mut self, buffer: &mut WireBuffer) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        while !buffer.spare_capacity_mut().is_empty() {
            match receive_from_socket(&self.socket, buffer.spare_capacity_mut(), MsgFlags::empty())
            {
                Ok(0) => {
                    self.close();
                    return Err(TransportError::Disconnected);
                }
                Ok(received) => buffer.set_received(received),
                Err(err) if err.is_interrupted() => continue,
                Err(err) => return Err(self.fail(err)),
            }
        }
        Ok(())
    }

    /// Send every valid byte of `buffer`.
    ///
    /// A send failure closes the channel.
    pub fn write(&mut self, buffer: &WireBuffer) -> Result<(), TransportError> {
        self.write_bytes(buffer.as_bytes())
    }

    pub(crate) fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let flags = send_flags();
        while !bytes.is_empty() {
            match send_on_socket(&self.socket, bytes, flags) {
                Ok(0) => {
                    self.close();
                    return Err(TransportError::Disconnected);
                }
                Ok(sent) => bytes = &bytes[sent..],
                Err(err) if err.is_interrupted() => continue,
                Err(err) => return Err(self.fail(err)),
            }
        }
        Ok(())
    }

    /// Close the connection. Closing a closed channel does nothing.
    pub fn close(&mut self) {
        if !self.socket.is_open() {
            return;
        }
        if let Err(err) = close_socket(&mut self.socket) {
            debug!("TransportChannel: close failed: {err}");
        }
    }

    fn fail(&mut self, err: NetError) -> TransportError {
        self.close();
        self.last_error = Some(err.clone());
        TransportError::Net(err)
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_stream(host: &str, port: u16) -> Result<Socket, NetError> {
    let addr = resolve_host(host, port)?;
    let socket = create_socket(family_of(&addr), SocketType::Stream, Protocol::Tcp)?;
    let target = SockAddr::from(addr);
    loop {
        match connect_socket(&socket, &target) {
            Ok(()) => break,
            Err(err) if err.is_interrupted() => continue,
            Err(err) => return Err(err),
        }
    }
    set_no_delay(&socket, true)?;
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    socket.set_no_sigpipe()?;
    Ok(socket)
}

/// Server socket accepting [`TransportChannel`]s.
#[derive(Debug)]
pub struct ListeningChannel {
    socket: Socket,
    last_error: Option<NetError>,
}

impl ListeningChannel {
    /// Listen on every IPv4 interface.
    pub fn listen(port: u16) -> Result<Self, TransportError> {
        Self::listen_on(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    /// Listen on `ip:port` with address reuse and a fixed backlog.
    pub fn listen_on(ip: IpAddr, port: u16) -> Result<Self, TransportError> {
        let addr = SocketAddr::new(ip, port);
        let socket = create_socket(family_of(&addr), SocketType::Stream, Protocol::Tcp)?;
        set_reuse_addr(&socket, true)?;
        bind_socket(&socket, &SockAddr::from(addr))?;
        listen_on_socket(&socket, LISTEN_BACKLOG)?;
        Ok(Self {
            socket,
            last_error: None,
        })
    }

    /// Wait for (or, when non-blocking, poll for) the next connection.
    ///
    /// Returns a closed channel when nothing is pending or the accept
    /// failed; a failure is recorded in [`last_error`](Self::last_error).
    pub fn accept(&mut self) -> TransportChannel {
        loop {
            match accept_on_socket(&self.socket) {
                Ok((socket, _peer)) => return TransportChannel::from_socket(socket),
                Err(err) if err.is_interrupted() => continue,
                Err(err) if err.is_would_block() => return TransportChannel::new(),
                Err(err) => {
                    debug!("ListeningChannel: accept failed: {err}");
                    self.last_error = Some(err);
                    return TransportChannel::new();
                }
            }
        }
    }

    /// Switch between blocking and polling accepts.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), TransportError> {
        self.socket.set_nonblocking(nonblocking)?;
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok().and_then(|addr| addr.as_socket())
    }

    /// The bound port, useful after listening on port 0.
    pub fn local_port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    pub fn last_error(&self) -> Option<&NetError> {
        self.last_error.as_ref()
    }

    /// Hand over the recorded failure, clearing it.
    pub fn take_last_error(&mut self) -> Option<NetError> {
        self.last_error.take()
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_open()
    }

    pub fn close(&mut self) {
        if self.socket.is_open()
            && let Err(err) = close_socket(&mut self.socket)
        {
            debug!("ListeningChannel: close failed: {err}");
        }
    }
}

impl Drop for ListeningChannel {
    fn drop(&mut self) {
        self.close();
    }
}
