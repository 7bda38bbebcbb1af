//! Port availability and readiness probes.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;

/// Binds `host:port` and releases it immediately.
///
/// # Errors
///
/// Returns [`PipelineError::PortUnavailable`] when the address is in use and
/// [`PipelineError::PortProbe`] for any other bind or resolution failure.
pub fn ensure_port_available(host: &str, port: u16) -> Result<(), PipelineError> {
    match TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => Err(PipelineError::PortUnavailable {
            host: host.to_owned(),
            port,
        }),
        Err(err) => Err(PipelineError::PortProbe {
            host: host.to_owned(),
            port,
            source: Arc::new(err),
        }),
    }
}

/// Address to connect to when checking whether a service bound to
/// `host:port` is accepting connections. Wildcard hosts map to loopback.
pub(crate) fn readiness_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let address = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))?;
    let ip = match address.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    Ok(SocketAddr::new(ip, port))
}

pub(crate) fn accepts_connections(address: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&address, timeout).is_ok()
}
