use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use crate::capabilities::HostAddress;

/// Public address used only to pick the outbound route; nothing is sent to it
const ROUTE_PROBE_TARGET: &str = "8.8.8.8:80";

/// The /24 network this host sits on, e.g. `192.168.1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub fn containing(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Self([a, b, c])
    }

    /// Host addresses .1 through .254, in order
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        let [a, b, c] = self.0;
        (1..=254u8).map(move |d| Ipv4Addr::new(a, b, c, d))
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => Self::containing(*v4) == *self,
            IpAddr::V6(_) => false,
        }
    }

    /// nmap target expression covering every host in the range
    pub fn nmap_range(&self) -> String {
        format!("{}.1-254", self)
    }
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}

/// Finds the local IPv4 address the kernel would route outbound traffic from.
///
/// Connecting a UDP socket only selects a route; no packet leaves the host.
#[derive(Debug, Clone, Default)]
pub struct RoutedHostAddress {
    pinned: Option<Ipv4Addr>,
}

impl RoutedHostAddress {
    pub fn new(pinned: Option<Ipv4Addr>) -> Self {
        Self { pinned }
    }
}

impl HostAddress for RoutedHostAddress {
    fn outbound_ipv4(&self) -> Option<Ipv4Addr> {
        if let Some(addr) = self.pinned {
            return Some(addr);
        }

        match route_source_address() {
            Ok(addr) => Some(addr),
            Err(e) => {
                tracing::error!("Failed to get local IP: {}", e);
                None
            }
        }
    }
}

fn route_source_address() -> std::io::Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(ROUTE_PROBE_TARGET)?;
    match socket.local_addr()? {
        SocketAddr::V4(v4) if !v4.ip().is_unspecified() => Ok(*v4.ip()),
        other => Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no IPv4 route source (got {})", other),
        )),
    }
}

/// URL the display is pointed at and the endpoint health check requests
pub fn endpoint_url(host: Ipv4Addr, port: u16) -> String {
    format!("http://{}:{}/", host, port)
}
