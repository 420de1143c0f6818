//! Local endpoint addresses.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use thiserror::Error;

/// A local endpoint could not be parsed or resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve local endpoint '{input}': {reason}")]
pub struct EndpointParseError {
    pub input: String,
    pub reason: String,
}

/// A local address that outbound connections are bound to.
///
/// Accepted forms: `192.168.1.6`, `192.168.1.6:0`, `[fe80::1]:0`, `::1`,
/// a resolvable host name such as `localhost`, or `default` for the
/// unspecified address (the operating system's default route).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalEndpoint {
    addr: SocketAddr,
}

impl LocalEndpoint {
    /// Endpoint for a specific local IP, any port.
    pub fn new(ip: IpAddr) -> Self {
        Self {
            addr: SocketAddr::new(ip, 0),
        }
    }

    /// Endpoint for an exact socket address.
    pub fn with_port(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// The unspecified endpoint: connections use the default route.
    pub fn default_route() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Socket address to reserve.
    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// IP that outbound connections originate from.
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Whether this endpoint leaves route selection to the OS.
    pub fn is_default_route(&self) -> bool {
        self.addr.ip().is_unspecified()
    }
}

impl fmt::Display for LocalEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_route() {
            write!(f, "default route")
        } else if self.addr.port() == 0 {
            write!(f, "{}", self.addr.ip())
        } else {
            write!(f, "{}", self.addr)
        }
    }
}

impl FromStr for LocalEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(EndpointParseError {
                input: s.to_string(),
                reason: "empty address".to_string(),
            });
        }
        if input.eq_ignore_ascii_case("default") {
            return Ok(Self::default_route());
        }
        if let Ok(addr) = input.parse::<SocketAddr>() {
            return Ok(Self::with_port(addr));
        }
        if let Ok(ip) = input.parse::<IpAddr>() {
            return Ok(Self::new(ip));
        }

        let resolved = (input, 0u16)
            .to_socket_addrs()
            .map_err(|e| EndpointParseError {
                input: input.to_string(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| EndpointParseError {
                input: input.to_string(),
                reason: "no addresses".to_string(),
            })?;
        Ok(Self::with_port(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_parse_bare_ip() {
        let endpoint: LocalEndpoint = "192.168.1.6".parse().unwrap();
        assert_eq!(endpoint.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 6)));
        assert_eq!(endpoint.socket_addr().port(), 0);
        assert_eq!(endpoint.to_string(), "192.168.1.6");
    }

    #[test]
    fn test_parse_socket_addr() {
        let endpoint: LocalEndpoint = "10.0.0.2:40001".parse().unwrap();
        assert_eq!(endpoint.socket_addr().port(), 40001);
        assert_eq!(endpoint.to_string(), "10.0.0.2:40001");
    }

    #[test]
    fn test_parse_ipv6() {
        let endpoint: LocalEndpoint = "::1".parse().unwrap();
        assert_eq!(endpoint.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));

        let endpoint: LocalEndpoint = "[::1]:5000".parse().unwrap();
        assert_eq!(endpoint.socket_addr().port(), 5000);
    }

    #[test]
    fn test_parse_default_route() {
        let endpoint: LocalEndpoint = "default".parse().unwrap();
        assert!(endpoint.is_default_route());
        assert_eq!(endpoint.to_string(), "default route");

        let endpoint: LocalEndpoint = "0.0.0.0".parse().unwrap();
        assert!(endpoint.is_default_route());
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!("".parse::<LocalEndpoint>().is_err());
        assert!("   ".parse::<LocalEndpoint>().is_err());
        assert!("not an address at all".parse::<LocalEndpoint>().is_err());
    }
}
