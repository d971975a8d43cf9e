//! Non-blocking TCP listener.
//!
//! mio's `TcpListener::bind` does not expose the accept backlog, so the
//! socket is built with rustix (socket → `SO_REUSEADDR` → bind → listen
//! with an explicit backlog) and then handed to mio in non-blocking mode.
//! The backlog is load-bearing: once the worker pool is at capacity the
//! acceptor stops calling accept, and pending connection attempts queue
//! in the kernel instead of being refused.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener as StdTcpListener};

use mio::net::TcpListener as MioTcpListener;
use rustix::net::{AddressFamily, SocketType};

use super::{Conn, Endpoint};

/// Default kernel accept backlog.
pub const DEFAULT_BACKLOG: i32 = 32;

/// A non-blocking listening socket.
pub struct Listener {
    inner: MioTcpListener,
}

impl Listener {
    /// Creates a listening socket bound to `endpoint` with the given
    /// accept backlog, in non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns an error if any of socket creation, bind, or listen fails
    /// (e.g., address in use, privileged port).
    pub fn bind(endpoint: Endpoint, backlog: i32) -> io::Result<Self> {
        let family = match endpoint.as_socket_addr() {
            SocketAddr::V4(_) => AddressFamily::INET,
            SocketAddr::V6(_) => AddressFamily::INET6,
        };

        let fd = rustix::net::socket(family, SocketType::STREAM, None)?;
        rustix::net::sockopt::set_socket_reuseaddr(&fd, true)?;
        rustix::net::bind(&fd, &endpoint.as_socket_addr())?;
        rustix::net::listen(&fd, backlog)?;

        let listener = StdTcpListener::from(fd);
        listener.set_nonblocking(true)?;
        Ok(Self {
            inner: MioTcpListener::from_std(listener),
        })
    }

    /// Returns the endpoint this listener is bound to.
    ///
    /// Useful after binding port 0 to learn the kernel-assigned port.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be retrieved.
    pub fn local_addr(&self) -> io::Result<Endpoint> {
        self.inner.local_addr().map(Endpoint::from)
    }

    /// Attempts to accept one pending connection.
    ///
    /// Returns `Ok(None)` when no connection is pending (or the accept
    /// was interrupted), so polling loops can sleep and retry. The
    /// returned [`Conn`] is already non-blocking.
    ///
    /// # Errors
    ///
    /// Returns an error on listening-socket failure; the caller treats
    /// that as unrecoverable.
    pub fn try_accept(&self) -> io::Result<Option<(Conn, Endpoint)>> {
        match self.inner.accept() {
            Ok((stream, addr)) => Ok(Some((Conn::from_stream(stream), Endpoint::from(addr)))),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
