//! Thin, error-returning layer over OS socket calls.
//!
//! Each function returns a [`NetError`] naming the failing call rather than a
//! bare OS code. Operations on a handle that is not open fail with a
//! bad-descriptor error; nothing here retries on interruption.

use std::fmt;
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;

use socket2::{Domain, SockAddr, Type};

use super::error::NetError;
use super::mapping::{
    AddressFamily, MsgFlags, Protocol, ShutdownDirection, SocketLevel, SocketOption, SocketType,
    af_to_int, mf_to_int, proto_to_int, sd_to_int, sol_to_int, so_to_int, st_to_int,
};

/// An OS socket descriptor, or nothing.
///
/// There is deliberately no `Clone`; see [`Socket::try_clone_descriptor`].
pub struct Socket {
    raw: Option<socket2::Socket>,
    family: AddressFamily,
    socktype: SocketType,
    protocol: Protocol,
}

/// Value passed to [`set_option`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Flag(bool),
    /// `None` disables lingering.
    Linger(Option<Duration>),
}

impl Socket {
    /// A handle that owns no descriptor.
    pub fn unopened() -> Self {
        Self {
            raw: None,
            family: AddressFamily::Unspec,
            socktype: SocketType::Unspec,
            protocol: Protocol::Ip,
        }
    }

    pub fn is_open(&self) -> bool {
        self.raw.is_some()
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn socket_type(&self) -> SocketType {
        self.socktype
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Duplicate the descriptor into an independent handle.
    pub fn try_clone_descriptor(&self) -> Result<Socket, NetError> {
        let raw = self.raw("dup")?;
        let copy = raw.try_clone().map_err(|e| NetError::from_io(&e, "dup"))?;
        Ok(Socket {
            raw: Some(copy),
            family: self.family,
            socktype: self.socktype,
            protocol: self.protocol,
        })
    }

    pub fn local_addr(&self) -> Result<SockAddr, NetError> {
        self.raw("getsockname")?
            .local_addr()
            .map_err(|e| NetError::from_io(&e, "getsockname"))
    }

    pub fn peer_addr(&self) -> Result<SockAddr, NetError> {
        self.raw("getpeername")?
            .peer_addr()
            .map_err(|e| NetError::from_io(&e, "getpeername"))
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), NetError> {
        self.raw("setsockopt")?
            .set_read_timeout(timeout)
            .map_err(|e| NetError::from_io(&e, "setsockopt"))
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), NetError> {
        self.raw("setsockopt")?
            .set_write_timeout(timeout)
            .map_err(|e| NetError::from_io(&e, "setsockopt"))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), NetError> {
        self.raw("fcntl")?
            .set_nonblocking(nonblocking)
            .map_err(|e| NetError::from_io(&e, "fcntl"))
    }

    /// Stop the platform raising `SIGPIPE` for writes on this socket.
    ///
    /// Only meaningful where `MSG_NOSIGNAL` does not exist.
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    pub fn set_no_sigpipe(&self) -> Result<(), NetError> {
        self.raw("setsockopt")?
            .set_nosigpipe(true)
            .map_err(|e| NetError::from_io(&e, "setsockopt"))
    }

    fn raw(&self, origin: &'static str) -> Result<&socket2::Socket, NetError> {
        self.raw
            .as_ref()
            .ok_or_else(|| NetError::bad_descriptor(origin))
    }
}

impl Default for Socket {
    fn default() -> Self {
        Self::unopened()
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("open", &self.is_open())
            .field("family", &self.family)
            .field("socktype", &self.socktype)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// Reject family/type/protocol triples no platform can create.
fn check_combination(
    family: AddressFamily,
    socktype: SocketType,
    protocol: Protocol,
) -> Result<(), NetError> {
    let supported = match (family, socktype, protocol) {
        (AddressFamily::Unspec, _, _) | (_, SocketType::Unspec, _) => false,
        (AddressFamily::Unix, _, Protocol::Ip) => true,
        (AddressFamily::Unix, _, _) => false,
        (_, SocketType::Stream, Protocol::Tcp | Protocol::Ip) => true,
        (_, _, Protocol::Tcp) => false,
        (_, SocketType::Dgram, Protocol::Udp | Protocol::Ip | Protocol::Icmp) => true,
        (_, _, Protocol::Udp) => false,
        _ => true,
    };
    if supported {
        Ok(())
    } else {
        Err(NetError::not_supported("socket"))
    }
}

/// Open a new socket.
pub fn create_socket(
    family: AddressFamily,
    socktype: SocketType,
    protocol: Protocol,
) -> Result<Socket, NetError> {
    check_combination(family, socktype, protocol)?;
    let domain = Domain::from(af_to_int(family)?);
    let ty = Type::from(st_to_int(socktype)?);
    let proto = socket2::Protocol::from(proto_to_int(protocol)?);
    let raw = socket2::Socket::new(domain, ty, Some(proto))
        .map_err(|e| NetError::from_io(&e, "socket"))?;
    Ok(Socket {
        raw: Some(raw),
        family,
        socktype,
        protocol,
    })
}

pub fn connect_socket(socket: &Socket, addr: &SockAddr) -> Result<(), NetError> {
    socket
        .raw("connect")?
        .connect(addr)
        .map_err(|e| NetError::from_io(&e, "connect"))
}

pub fn bind_socket(socket: &Socket, addr: &SockAddr) -> Result<(), NetError> {
    socket
        .raw("bind")?
        .bind(addr)
        .map_err(|e| NetError::from_io(&e, "bind"))
}

pub fn listen_on_socket(socket: &Socket, backlog: i32) -> Result<(), NetError> {
    socket
        .raw("listen")?
        .listen(backlog)
        .map_err(|e| NetError::from_io(&e, "listen"))
}

/// Accept one pending connection.
///
/// Either both the new socket and the peer address are produced or neither
/// is; a failed accept creates no handle.
pub fn accept_on_socket(listener: &Socket) -> Result<(Socket, SockAddr), NetError> {
    let (raw, peer) = listener
        .raw("accept")?
        .accept()
        .map_err(|e| NetError::from_io(&e, "accept"))?;
    let socket = Socket {
        raw: Some(raw),
        family: listener.family,
        socktype: listener.socktype,
        protocol: listener.protocol,
    };
    Ok((socket, peer))
}

pub fn send_on_socket(socket: &Socket, data: &[u8], flags: MsgFlags) -> Result<usize, NetError> {
    let raw = socket.raw("send")?;
    let flags = mf_to_int(flags)?;
    raw.send_with_flags(data, flags)
        .map_err(|e| NetError::from_io(&e, "send"))
}

/// Receive into `buf`; `Ok(0)` means the peer closed the stream.
pub fn receive_from_socket(
    socket: &Socket,
    buf: &mut [u8],
    flags: MsgFlags,
) -> Result<usize, NetError> {
    let raw = socket.raw("recv")?;
    let flags = mf_to_int(flags)?;
    // SAFETY: `[u8]` and `[MaybeUninit<u8>]` share layout, and recv only
    // writes initialised bytes into the slice.
    let uninit = unsafe { &mut *(std::ptr::from_mut(buf) as *mut [MaybeUninit<u8>]) };
    raw.recv_with_flags(uninit, flags)
        .map_err(|e| NetError::from_io(&e, "recv"))
}

pub fn shutdown_socket(socket: &Socket, direction: ShutdownDirection) -> Result<(), NetError> {
    let raw = socket.raw("shutdown")?;
    sd_to_int(direction)?;
    raw.shutdown(direction.into())
        .map_err(|e| NetError::from_io(&e, "shutdown"))
}

/// Release the descriptor.
///
/// The handle is unopened afterwards whatever the outcome; closing an
/// already-closed handle reports a bad-descriptor error.
pub fn close_socket(socket: &mut Socket) -> Result<(), NetError> {
    let raw = socket
        .raw
        .take()
        .ok_or_else(|| NetError::bad_descriptor("close"))?;
    close_raw(raw)
}

#[cfg(unix)]
fn close_raw(raw: socket2::Socket) -> Result<(), NetError> {
    use std::os::fd::IntoRawFd;

    let fd = raw.into_raw_fd();
    // SAFETY: `fd` was just released by its owner and is closed exactly once.
    if unsafe { libc::close(fd) } == -1 {
        return Err(NetError::from_io(&io::Error::last_os_error(), "close"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn close_raw(raw: socket2::Socket) -> Result<(), NetError> {
    drop(raw);
    Ok(())
}

/// Set `option` at `level`.
///
/// The pair must match where the option is defined, so `NoDelay` is only
/// accepted at [`SocketLevel::Tcp`].
pub fn set_option(
    socket: &Socket,
    level: SocketLevel,
    option: SocketOption,
    value: OptionValue,
) -> Result<(), NetError> {
    let raw = socket.raw("setsockopt")?;
    if option.level() != level {
        return Err(NetError::not_supported("setsockopt"));
    }
    let level = sol_to_int(level)?;
    let name = so_to_int(option)?;
    match (option, value) {
        (SocketOption::Linger, OptionValue::Linger(linger)) => {
            setsockopt_linger(raw, level, name, linger)
        }
        (SocketOption::Linger, OptionValue::Flag(_)) | (_, OptionValue::Linger(_)) => {
            Err(NetError::not_supported("setsockopt"))
        }
        (_, OptionValue::Flag(enabled)) => setsockopt_flag(raw, level, name, option, enabled),
    }
}

#[cfg(unix)]
fn setsockopt_flag(
    raw: &socket2::Socket,
    level: i32,
    name: i32,
    _option: SocketOption,
    enabled: bool,
) -> Result<(), NetError> {
    let value = libc::c_int::from(enabled);
    setsockopt_raw(raw, level, name, &value)
}

#[cfg(unix)]
fn setsockopt_linger(
    raw: &socket2::Socket,
    level: i32,
    name: i32,
    linger: Option<Duration>,
) -> Result<(), NetError> {
    let value = libc::linger {
        l_onoff: libc::c_int::from(linger.is_some()),
        l_linger: linger
            .map(|d| libc::c_int::try_from(d.as_secs()).unwrap_or(libc::c_int::MAX))
            .unwrap_or(0),
    };
    setsockopt_raw(raw, level, name, &value)
}

#[cfg(unix)]
fn setsockopt_raw<T>(raw: &socket2::Socket, level: i32, name: i32, value: &T) -> Result<(), NetError> {
    use std::os::fd::AsRawFd;

    let len = libc::socklen_t::try_from(std::mem::size_of::<T>())
        .map_err(|_| NetError::not_supported("setsockopt"))?;
    // SAFETY: `value` points at a live `T` of `len` bytes for the duration of
    // the call and the descriptor is owned by `raw`.
    let rc = unsafe {
        libc::setsockopt(
            raw.as_raw_fd(),
            level,
            name,
            std::ptr::from_ref(value).cast::<libc::c_void>(),
            len,
        )
    };
    if rc == -1 {
        return Err(NetError::from_io(&io::Error::last_os_error(), "setsockopt"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn setsockopt_flag(
    raw: &socket2::Socket,
    _level: i32,
    _name: i32,
    option: SocketOption,
    enabled: bool,
) -> Result<(), NetError> {
    let result = match option {
        SocketOption::KeepAlive => raw.set_keepalive(enabled),
        SocketOption::ReuseAddr => raw.set_reuse_address(enabled),
        SocketOption::NoDelay => raw.set_tcp_nodelay(enabled),
        SocketOption::Linger => return Err(NetError::not_supported("setsockopt")),
    };
    result.map_err(|e| NetError::from_io(&e, "setsockopt"))
}

#[cfg(not(unix))]
fn setsockopt_linger(
    raw: &socket2::Socket,
    _level: i32,
    _name: i32,
    linger: Option<Duration>,
) -> Result<(), NetError> {
    raw.set_linger(linger)
        .map_err(|e| NetError::from_io(&e, "setsockopt"))
}

pub fn set_keep_alive(socket: &Socket, enabled: bool) -> Result<(), NetError> {
    set_option(
        socket,
        SocketLevel::Socket,
        SocketOption::KeepAlive,
        OptionValue::Flag(enabled),
    )
}

pub fn set_linger(socket: &Socket, linger: Option<Duration>) -> Result<(), NetError> {
    set_option(
        socket,
        SocketLevel::Socket,
        SocketOption::Linger,
        OptionValue::Linger(linger),
    )
}

pub fn set_reuse_addr(socket: &Socket, enabled: bool) -> Result<(), NetError> {
    set_option(
        socket,
        SocketLevel::Socket,
        SocketOption::ReuseAddr,
        OptionValue::Flag(enabled),
    )
}

pub fn set_no_delay(socket: &Socket, enabled: bool) -> Result<(), NetError> {
    set_option(
        socket,
        SocketLevel::Tcp,
        SocketOption::NoDelay,
        OptionValue::Flag(enabled),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ErrorKind;
    use rstest::{fixture, rstest};
    use std::net::{Ipv4Addr, SocketAddr};

    #[fixture]
    fn tcp_socket() -> Socket {
        create_socket(AddressFamily::Inet, SocketType::Stream, Protocol::Tcp)
            .expect("create tcp socket")
    }

    #[rstest]
    #[case(AddressFamily::Unspec, SocketType::Stream, Protocol::Tcp)]
    #[case(AddressFamily::Inet, SocketType::Unspec, Protocol::Tcp)]
    #[case(AddressFamily::Inet, SocketType::Dgram, Protocol::Tcp)]
    #[case(AddressFamily::Unix, SocketType::Stream, Protocol::Tcp)]
    fn unmapped_combinations_are_not_supported(
        #[case] family: AddressFamily,
        #[case] socktype: SocketType,
        #[case] protocol: Protocol,
    ) {
        let err = create_socket(family, socktype, protocol).expect_err("combination rejected");
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert_eq!(err.origin(), "socket");
    }

    #[rstest]
    fn operations_on_unopened_socket_fail_cleanly() {
        let mut socket = Socket::unopened();
        assert!(send_on_socket(&socket, b"x", MsgFlags::empty()).is_err());
        assert!(receive_from_socket(&socket, &mut [0; 4], MsgFlags::empty()).is_err());
        assert!(set_keep_alive(&socket, true).is_err());
        let err = close_socket(&mut socket).expect_err("nothing to close");
        assert_eq!(err.origin(), "close");
    }

    #[rstest]
    fn close_is_idempotent(mut tcp_socket: Socket) {
        close_socket(&mut tcp_socket).expect("first close succeeds");
        assert!(!tcp_socket.is_open());
        assert!(close_socket(&mut tcp_socket).is_err());
    }

    #[rstest]
    fn boolean_options_apply(tcp_socket: Socket) {
        set_keep_alive(&tcp_socket, true).expect("keep-alive");
        set_reuse_addr(&tcp_socket, true).expect("reuse-addr");
        set_no_delay(&tcp_socket, true).expect("no-delay");
        set_linger(&tcp_socket, Some(Duration::from_secs(1))).expect("linger");
    }

    #[rstest]
    fn mismatched_level_is_not_supported(tcp_socket: Socket) {
        let err = set_option(
            &tcp_socket,
            SocketLevel::Socket,
            SocketOption::NoDelay,
            OptionValue::Flag(true),
        )
        .expect_err("no-delay is a tcp option");
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }

    #[rstest]
    fn accept_yields_socket_and_peer(tcp_socket: Socket) {
        let any = SockAddr::from(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
        bind_socket(&tcp_socket, &any).expect("bind");
        listen_on_socket(&tcp_socket, 1).expect("listen");
        let target = tcp_socket.local_addr().expect("local addr");

        let client = create_socket(AddressFamily::Inet, SocketType::Stream, Protocol::Tcp)
            .expect("client socket");
        connect_socket(&client, &target).expect("connect");
        let (accepted, peer) = accept_on_socket(&tcp_socket).expect("accept");
        assert!(accepted.is_open());
        assert_eq!(
            peer.as_socket().map(|a| a.ip()),
            Some(Ipv4Addr::LOCALHOST.into())
        );

        send_on_socket(&client, b"ping", MsgFlags::empty()).expect("send");
        let mut buf = [0; 4];
        let read = receive_from_socket(&accepted, &mut buf, MsgFlags::WAIT_ALL).expect("recv");
        assert_eq!(&buf[..read], b"ping");
    }
}
