//! Socket abstraction and the transport channel built on it.

mod channel;
mod error;
pub mod mapping;
mod wrapper;

pub use channel::{LISTEN_BACKLOG, ListeningChannel, TransportChannel, TransportError, resolve_host};
pub use error::{ErrorKind, NetError};
pub use mapping::{
    AddressFamily, MsgFlags, Protocol, ShutdownDirection, SocketLevel, SocketOption, SocketType,
};
pub use wrapper::{
    OptionValue, Socket, accept_on_socket, bind_socket, close_socket, connect_socket,
    create_socket, listen_on_socket, receive_from_socket, send_on_socket, set_keep_alive,
    set_linger, set_no_delay, set_option, set_reuse_addr, shutdown_socket,
};
