//! An accepted, non-blocking connection.

use std::io::{self, ErrorKind, Read};

use mio::net::TcpStream as MioTcpStream;

use super::Endpoint;

/// One accepted client connection.
///
/// The stream is non-blocking; [`Conn::try_read`] never parks the caller.
/// `Conn` owns the descriptor: dropping it closes the connection, and
/// because ownership is unique the close happens exactly once no matter
/// which path the owning worker exits through.
pub struct Conn {
    inner: MioTcpStream,
}

impl Conn {
    pub(crate) fn from_stream(stream: MioTcpStream) -> Self {
        Self { inner: stream }
    }

    /// Returns the remote peer's endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer address cannot be retrieved.
    pub fn peer_addr(&self) -> io::Result<Endpoint> {
        self.inner.peer_addr().map(Endpoint::from)
    }

    /// Attempts to read into `buf` without blocking.
    ///
    /// Returns `Ok(None)` when no data is available yet (would-block or
    /// interrupted), `Ok(Some(0))` when the peer has closed the
    /// connection, and `Ok(Some(n))` with the byte count otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure (reset, broken pipe, ...).
    pub fn try_read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.inner.read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
