//! Address type for listeners and peers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// An IP address + port pair.
///
/// Thin wrapper around [`SocketAddr`] so the rest of the crate talks
/// about endpoints without committing to a socket backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    /// Creates an endpoint from an IP address and port.
    #[must_use]
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(ip, port))
    }

    /// An endpoint on all local interfaces (0.0.0.0) at the given port.
    #[must_use]
    pub const fn any(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    /// A loopback endpoint at the given port.
    ///
    /// Port 0 asks the kernel for an ephemeral port; the actual port is
    /// available from the bound listener.
    #[must_use]
    pub const fn localhost(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Returns the IP address.
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    /// Returns the port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.0.port()
    }

    /// Returns the underlying [`SocketAddr`].
    #[must_use]
    pub const fn as_socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(ep: Endpoint) -> Self {
        ep.0
    }
}

impl FromStr for Endpoint {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>().map(Self)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_binds_all_interfaces() {
        let ep = Endpoint::any(8001);
        assert_eq!(ep.ip(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(ep.port(), 8001);
    }

    #[test]
    fn localhost_is_loopback() {
        let ep = Endpoint::localhost(0);
        assert_eq!(ep.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(ep.port(), 0);
    }

    #[test]
    fn parses_and_displays() {
        let ep: Endpoint = "10.1.2.3:9000".parse().unwrap();
        assert_eq!(ep.port(), 9000);
        assert_eq!(format!("{ep}"), "10.1.2.3:9000");
    }

    #[test]
    fn socket_addr_roundtrip() {
        let addr: SocketAddr = "127.0.0.1:4242".parse().unwrap();
        assert_eq!(SocketAddr::from(Endpoint::from(addr)), addr);
    }
}
