//! Error value shared by every socket operation.
//!
//! A [`NetError`] records what kind of failure occurred, the numeric code and
//! the call that produced it. The human-readable message is rendered from the
//! code on first use and cached, so the hot path never formats strings it
//! might not need.

use std::fmt;
use std::io;

use once_cell::sync::OnceCell;

/// Category of a socket failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No failure recorded.
    None,
    /// The requested family, type, option or flag has no OS counterpart here.
    NotSupported,
    /// An OS error number (`errno` on Unix).
    Errno,
    /// A platform last-error code (`GetLastError`/`WSAGetLastError` on Windows).
    LastError,
}

/// Failure reported by a socket operation.
pub struct NetError {
    kind: ErrorKind,
    code: i32,
    origin: &'static str,
    message: OnceCell<String>,
}

impl NetError {
    pub fn new(kind: ErrorKind, code: i32, origin: &'static str) -> Self {
        Self {
            kind,
            code,
            origin,
            message: OnceCell::new(),
        }
    }

    /// A value meaning "no failure", used to seed a channel's last error.
    pub fn none() -> Self {
        Self::new(ErrorKind::None, 0, "")
    }

    pub fn not_supported(origin: &'static str) -> Self {
        Self::new(ErrorKind::NotSupported, 0, origin)
    }

    /// Wrap an OS error code in the platform's native category.
    pub fn os(code: i32, origin: &'static str) -> Self {
        Self::new(native_kind(), code, origin)
    }

    /// Convert an `io::Error`, preserving its raw OS code when present.
    pub fn from_io(err: &io::Error, origin: &'static str) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::os(code, origin),
            None if err.kind() == io::ErrorKind::Unsupported => Self::not_supported(origin),
            None => {
                let error = Self::os(0, origin);
                let _ = error.message.set(err.to_string());
                error
            }
        }
    }

    /// The error returned for operations on a handle that is not open.
    pub fn bad_descriptor(origin: &'static str) -> Self {
        Self::os(ebadf(), origin)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn origin(&self) -> &'static str {
        self.origin
    }

    pub fn is_none(&self) -> bool {
        self.kind == ErrorKind::None
    }

    /// `true` when the call was interrupted by a signal and may be retried.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.kind, ErrorKind::Errno | ErrorKind::LastError) && self.code == eintr()
    }

    /// `true` when a non-blocking call found nothing to do.
    pub fn is_would_block(&self) -> bool {
        matches!(self.kind, ErrorKind::Errno | ErrorKind::LastError)
            && self.code != 0
            && io::Error::from_raw_os_error(self.code).kind() == io::ErrorKind::WouldBlock
    }

    /// Rendered description, computed once.
    pub fn message(&self) -> &str {
        self.message.get_or_init(|| match self.kind {
            ErrorKind::None => "no error".to_owned(),
            ErrorKind::NotSupported => "operation not supported on this platform".to_owned(),
            ErrorKind::Errno => format!(
                "errno {}: {}",
                self.code,
                io::Error::from_raw_os_error(self.code)
            ),
            ErrorKind::LastError => format!(
                "error {}: {}",
                self.code,
                io::Error::from_raw_os_error(self.code)
            ),
        })
    }
}

#[cfg(windows)]
fn native_kind() -> ErrorKind {
    ErrorKind::LastError
}

#[cfg(not(windows))]
fn native_kind() -> ErrorKind {
    ErrorKind::Errno
}

#[cfg(unix)]
fn ebadf() -> i32 {
    libc::EBADF
}

#[cfg(not(unix))]
fn ebadf() -> i32 {
    // WSAENOTSOCK
    10038
}

#[cfg(unix)]
fn eintr() -> i32 {
    libc::EINTR
}

#[cfg(not(unix))]
fn eintr() -> i32 {
    // WSAEINTR
    10004
}

impl Clone for NetError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            code: self.code,
            origin: self.origin,
            message: self.message.clone(),
        }
    }
}

impl PartialEq for NetError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.code == other.code && self.origin == other.origin
    }
}

impl Eq for NetError {}

impl fmt::Debug for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetError")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("origin", &self.origin)
            .finish()
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.origin.is_empty() {
            f.write_str(self.message())
        } else {
            write!(f, "{}: {}", self.origin, self.message())
        }
    }
}

impl std::error::Error for NetError {}

impl From<NetError> for io::Error {
    fn from(err: NetError) -> Self {
        match err.kind {
            ErrorKind::Errno | ErrorKind::LastError if err.code != 0 => {
                io::Error::from_raw_os_error(err.code)
            }
            ErrorKind::NotSupported => io::Error::new(io::ErrorKind::Unsupported, err.to_string()),
            _ => io::Error::other(err.to_string()),
        }
    }
}
