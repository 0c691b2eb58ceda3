//! Closed enumerations for socket parameters and their OS integer values.
//!
//! Every enumerator has an explicit arm in each mapping. When the current
//! platform has no constant for an enumerator the mapping reports
//! [`ErrorKind::NotSupported`](super::ErrorKind::NotSupported) instead of
//! substituting a guess.

use std::ops::{BitOr, BitOrAssign};

use super::error::NetError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Unspec,
    Unix,
    Inet,
    Inet6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketType {
    Unspec,
    Stream,
    Dgram,
    Raw,
    /// Reliably delivered messages.
    Rdm,
    SeqPacket,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ip,
    Ipv6,
    Icmp,
    Raw,
    Tcp,
    Udp,
}

/// Level argument of `setsockopt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketLevel {
    Socket,
    Ip,
    Ipv6,
    Icmp,
    Raw,
    Tcp,
    Udp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketOption {
    KeepAlive,
    Linger,
    ReuseAddr,
    NoDelay,
}

impl SocketOption {
    /// The level at which the option is defined.
    pub fn level(self) -> SocketLevel {
        match self {
            SocketOption::KeepAlive | SocketOption::Linger | SocketOption::ReuseAddr => {
                SocketLevel::Socket
            }
            SocketOption::NoDelay => SocketLevel::Tcp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShutdownDirection {
    Read,
    Write,
    Both,
}

impl From<ShutdownDirection> for std::net::Shutdown {
    fn from(direction: ShutdownDirection) -> Self {
        match direction {
            ShutdownDirection::Read => std::net::Shutdown::Read,
            ShutdownDirection::Write => std::net::Shutdown::Write,
            ShutdownDirection::Both => std::net::Shutdown::Both,
        }
    }
}

/// Set of send/receive flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MsgFlags(u8);

impl MsgFlags {
    pub const EOR: MsgFlags = MsgFlags(1);
    /// Suppress the broken-pipe signal on a closed peer.
    pub const NO_SIGNAL: MsgFlags = MsgFlags(1 << 1);
    pub const PEEK: MsgFlags = MsgFlags(1 << 2);
    pub const OOB: MsgFlags = MsgFlags(1 << 3);
    pub const WAIT_ALL: MsgFlags = MsgFlags(1 << 4);

    const ALL: [MsgFlags; 5] = [
        MsgFlags::EOR,
        MsgFlags::NO_SIGNAL,
        MsgFlags::PEEK,
        MsgFlags::OOB,
        MsgFlags::WAIT_ALL,
    ];

    pub const fn empty() -> Self {
        MsgFlags(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: MsgFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MsgFlags {
    type Output = MsgFlags;

    fn bitor(self, rhs: MsgFlags) -> MsgFlags {
        MsgFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MsgFlags {
    fn bitor_assign(&mut self, rhs: MsgFlags) {
        self.0 |= rhs.0;
    }
}

fn require(value: Option<i32>, origin: &'static str) -> Result<i32, NetError> {
    value.ok_or_else(|| NetError::not_supported(origin))
}

pub fn af_to_int(family: AddressFamily) -> Result<i32, NetError> {
    let value = match family {
        AddressFamily::Unspec => sys::AF_UNSPEC,
        AddressFamily::Unix => sys::AF_UNIX,
        AddressFamily::Inet => sys::AF_INET,
        AddressFamily::Inet6 => sys::AF_INET6,
    };
    require(value, "af_to_int")
}

pub fn int_to_af(value: i32) -> Result<AddressFamily, NetError> {
    [
        AddressFamily::Unspec,
        AddressFamily::Unix,
        AddressFamily::Inet,
        AddressFamily::Inet6,
    ]
    .into_iter()
    .find(|family| af_to_int(*family).ok() == Some(value))
    .ok_or_else(|| NetError::not_supported("int_to_af"))
}

pub fn st_to_int(socktype: SocketType) -> Result<i32, NetError> {
    let value = match socktype {
        SocketType::Unspec => Some(0),
        SocketType::Stream => sys::SOCK_STREAM,
        SocketType::Dgram => sys::SOCK_DGRAM,
        SocketType::Raw => sys::SOCK_RAW,
        SocketType::Rdm => sys::SOCK_RDM,
        SocketType::SeqPacket => sys::SOCK_SEQPACKET,
    };
    require(value, "st_to_int")
}

pub fn int_to_st(value: i32) -> Result<SocketType, NetError> {
    [
        SocketType::Unspec,
        SocketType::Stream,
        SocketType::Dgram,
        SocketType::Raw,
        SocketType::Rdm,
        SocketType::SeqPacket,
    ]
    .into_iter()
    .find(|socktype| st_to_int(*socktype).ok() == Some(value))
    .ok_or_else(|| NetError::not_supported("int_to_st"))
}

pub fn proto_to_int(protocol: Protocol) -> Result<i32, NetError> {
    let value = match protocol {
        Protocol::Ip => sys::IPPROTO_IP,
        Protocol::Ipv6 => sys::IPPROTO_IPV6,
        Protocol::Icmp => sys::IPPROTO_ICMP,
        Protocol::Raw => sys::IPPROTO_RAW,
        Protocol::Tcp => sys::IPPROTO_TCP,
        Protocol::Udp => sys::IPPROTO_UDP,
    };
    require(value, "proto_to_int")
}

pub fn int_to_proto(value: i32) -> Result<Protocol, NetError> {
    [
        Protocol::Ip,
        Protocol::Ipv6,
        Protocol::Icmp,
        Protocol::Raw,
        Protocol::Tcp,
        Protocol::Udp,
    ]
    .into_iter()
    .find(|protocol| proto_to_int(*protocol).ok() == Some(value))
    .ok_or_else(|| NetError::not_supported("int_to_proto"))
}

pub fn sol_to_int(level: SocketLevel) -> Result<i32, NetError> {
    let value = match level {
        SocketLevel::Socket => sys::SOL_SOCKET,
        SocketLevel::Ip => sys::IPPROTO_IP,
        SocketLevel::Ipv6 => sys::IPPROTO_IPV6,
        SocketLevel::Icmp => sys::IPPROTO_ICMP,
        SocketLevel::Raw => sys::IPPROTO_RAW,
        SocketLevel::Tcp => sys::IPPROTO_TCP,
        SocketLevel::Udp => sys::IPPROTO_UDP,
    };
    require(value, "sol_to_int")
}

pub fn so_to_int(option: SocketOption) -> Result<i32, NetError> {
    let value = match option {
        SocketOption::KeepAlive => sys::SO_KEEPALIVE,
        SocketOption::Linger => sys::SO_LINGER,
        SocketOption::ReuseAddr => sys::SO_REUSEADDR,
        SocketOption::NoDelay => sys::TCP_NODELAY,
    };
    require(value, "so_to_int")
}

pub fn sd_to_int(direction: ShutdownDirection) -> Result<i32, NetError> {
    let value = match direction {
        ShutdownDirection::Read => sys::SHUT_RD,
        ShutdownDirection::Write => sys::SHUT_WR,
        ShutdownDirection::Both => sys::SHUT_RDWR,
    };
    require(value, "sd_to_int")
}

/// Combine `flags` into the OS bit mask.
///
/// Fails if any requested flag has no constant on this platform.
pub fn mf_to_int(flags: MsgFlags) -> Result<i32, NetError> {
    let mut out = 0;
    for flag in MsgFlags::ALL {
        if !flags.contains(flag) {
            continue;
        }
        let value = match flag {
            MsgFlags::EOR => sys::MSG_EOR,
            MsgFlags::NO_SIGNAL => sys::MSG_NOSIGNAL,
            MsgFlags::PEEK => sys::MSG_PEEK,
            MsgFlags::OOB => sys::MSG_OOB,
            MsgFlags::WAIT_ALL => sys::MSG_WAITALL,
            _ => None,
        };
        out |= require(value, "mf_to_int")?;
    }
    Ok(out)
}

#[cfg(unix)]
mod sys {
    pub const AF_UNSPEC: Option<i32> = Some(libc::AF_UNSPEC);
    pub const AF_UNIX: Option<i32> = Some(libc::AF_UNIX);
    pub const AF_INET: Option<i32> = Some(libc::AF_INET);
    pub const AF_INET6: Option<i32> = Some(libc::AF_INET6);

    pub const SOCK_STREAM: Option<i32> = Some(libc::SOCK_STREAM);
    pub const SOCK_DGRAM: Option<i32> = Some(libc::SOCK_DGRAM);
    pub const SOCK_RAW: Option<i32> = Some(libc::SOCK_RAW);
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub const SOCK_RDM: Option<i32> = Some(libc::SOCK_RDM);
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub const SOCK_RDM: Option<i32> = None;
    pub const SOCK_SEQPACKET: Option<i32> = Some(libc::SOCK_SEQPACKET);

    pub const IPPROTO_IP: Option<i32> = Some(libc::IPPROTO_IP);
    pub const IPPROTO_IPV6: Option<i32> = Some(libc::IPPROTO_IPV6);
    pub const IPPROTO_ICMP: Option<i32> = Some(libc::IPPROTO_ICMP);
    pub const IPPROTO_RAW: Option<i32> = Some(libc::IPPROTO_RAW);
    pub const IPPROTO_TCP: Option<i32> = Some(libc::IPPROTO_TCP);
    pub const IPPROTO_UDP: Option<i32> = Some(libc::IPPROTO_UDP);

    pub const SOL_SOCKET: Option<i32> = Some(libc::SOL_SOCKET);
    pub const SO_KEEPALIVE: Option<i32> = Some(libc::SO_KEEPALIVE);
    pub const SO_LINGER: Option<i32> = Some(libc::SO_LINGER);
    pub const SO_REUSEADDR: Option<i32> = Some(libc::SO_REUSEADDR);
    pub const TCP_NODELAY: Option<i32> = Some(libc::TCP_NODELAY);

    pub const SHUT_RD: Option<i32> = Some(libc::SHUT_RD);
    pub const SHUT_WR: Option<i32> = Some(libc::SHUT_WR);
    pub const SHUT_RDWR: Option<i32> = Some(libc::SHUT_RDWR);

    pub const MSG_EOR: Option<i32> = Some(libc::MSG_EOR);
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    pub const MSG_NOSIGNAL: Option<i32> = Some(libc::MSG_NOSIGNAL);
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    pub const MSG_NOSIGNAL: Option<i32> = None;
    pub const MSG_PEEK: Option<i32> = Some(libc::MSG_PEEK);
    pub const MSG_OOB: Option<i32> = Some(libc::MSG_OOB);
    pub const MSG_WAITALL: Option<i32> = Some(libc::MSG_WAITALL);
}

// WinSock values.
#[cfg(not(unix))]
mod sys {
    pub const AF_UNSPEC: Option<i32> = Some(0);
    pub const AF_UNIX: Option<i32> = Some(1);
    pub const AF_INET: Option<i32> = Some(2);
    pub const AF_INET6: Option<i32> = Some(23);

    pub const SOCK_STREAM: Option<i32> = Some(1);
    pub const SOCK_DGRAM: Option<i32> = Some(2);
    pub const SOCK_RAW: Option<i32> = Some(3);
    pub const SOCK_RDM: Option<i32> = Some(4);
    pub const SOCK_SEQPACKET: Option<i32> = Some(5);

    pub const IPPROTO_IP: Option<i32> = Some(0);
    pub const IPPROTO_IPV6: Option<i32> = Some(41);
    pub const IPPROTO_ICMP: Option<i32> = Some(1);
    pub const IPPROTO_RAW: Option<i32> = Some(255);
    pub const IPPROTO_TCP: Option<i32> = Some(6);
    pub const IPPROTO_UDP: Option<i32> = Some(17);

    pub const SOL_SOCKET: Option<i32> = Some(0xffff);
    pub const SO_KEEPALIVE: Option<i32> = Some(0x0008);
    pub const SO_LINGER: Option<i32> = Some(0x0080);
    pub const SO_REUSEADDR: Option<i32> = Some(0x0004);
    pub const TCP_NODELAY: Option<i32> = Some(0x0001);

    pub const SHUT_RD: Option<i32> = Some(0);
    pub const SHUT_WR: Option<i32> = Some(1);
    pub const SHUT_RDWR: Option<i32> = Some(2);

    pub const MSG_EOR: Option<i32> = None;
    pub const MSG_NOSIGNAL: Option<i32> = None;
    pub const MSG_PEEK: Option<i32> = Some(0x2);
    pub const MSG_OOB: Option<i32> = Some(0x1);
    pub const MSG_WAITALL: Option<i32> = Some(0x8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(AddressFamily::Unspec)]
    #[case(AddressFamily::Inet)]
    #[case(AddressFamily::Inet6)]
    fn address_families_map_both_ways(#[case] family: AddressFamily) {
        let value = af_to_int(family).expect("family is mapped");
        assert_eq!(int_to_af(value).expect("value is known"), family);
    }

    #[rstest]
    #[case(Protocol::Ip)]
    #[case(Protocol::Tcp)]
    #[case(Protocol::Udp)]
    fn protocols_map_both_ways(#[case] protocol: Protocol) {
        let value = proto_to_int(protocol).expect("protocol is mapped");
        assert_eq!(int_to_proto(value).expect("value is known"), protocol);
    }

    #[rstest]
    fn stream_type_maps_both_ways() {
        let value = st_to_int(SocketType::Stream).expect("stream is mapped");
        assert_eq!(int_to_st(value).expect("value is known"), SocketType::Stream);
    }

    #[rstest]
    fn unknown_integers_are_not_supported() {
        let err = int_to_af(-1).expect_err("no such family");
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert_eq!(err.origin(), "int_to_af");
    }

    #[rstest]
    fn no_delay_lives_at_tcp_level() {
        assert_eq!(SocketOption::NoDelay.level(), SocketLevel::Tcp);
        assert_eq!(SocketOption::Linger.level(), SocketLevel::Socket);
    }

    #[rstest]
    fn flags_combine_into_mask() {
        let mask = mf_to_int(MsgFlags::PEEK | MsgFlags::OOB).expect("flags are mapped");
        assert_ne!(mask, 0);
        assert_eq!(mf_to_int(MsgFlags::empty()).expect("empty set"), 0);
    }

    #[cfg(target_os = "macos")]
    #[rstest]
    fn no_signal_is_not_supported_without_msg_nosignal() {
        let err = mf_to_int(MsgFlags::NO_SIGNAL).expect_err("no MSG_NOSIGNAL");
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }
}
