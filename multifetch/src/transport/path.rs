//! One egress path: a reserved local endpoint and a client bound to it.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use super::endpoint::LocalEndpoint;
use crate::config::{JobConfig, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS};
use crate::error::{FetchError, FetchResult};
use crate::trust::TrustStore;

/// Timeouts applied to every path of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// Connection establishment including the TLS handshake.
    pub handshake_timeout: Duration,
    /// Pooled connections idle longer than this are closed.
    pub idle_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl From<&JobConfig> for TransportSettings {
    fn from(config: &JobConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout,
            idle_timeout: config.idle_timeout,
        }
    }
}

/// An HTTPS client pinned to one local endpoint.
///
/// Construction reserves the local address with a bound socket, which fails
/// early when the address does not belong to this host or the port is taken.
/// Every connection the client opens is bound to the same local IP, so all
/// traffic of the path leaves through the interface owning that address.
///
/// Dropping the path releases the reservation and closes pooled connections.
#[derive(Debug)]
pub struct TransportPath {
    endpoint: LocalEndpoint,
    client: Client,
    reservation: Option<UdpSocket>,
    settings: TransportSettings,
    verifies_server: bool,
}

impl TransportPath {
    /// Bind `endpoint` and build its client.
    ///
    /// # Errors
    ///
    /// - [`FetchError::EndpointBind`] if the address cannot be bound
    /// - [`FetchError::TransportBuild`] if the TLS client cannot be built
    pub fn bind(
        endpoint: LocalEndpoint,
        trust: &TrustStore,
        settings: TransportSettings,
    ) -> FetchResult<Self> {
        let reservation = if endpoint.is_default_route() {
            None
        } else {
            let socket = UdpSocket::bind(endpoint.socket_addr()).map_err(|source| {
                FetchError::EndpointBind {
                    endpoint: endpoint.to_string(),
                    source,
                }
            })?;
            Some(socket)
        };

        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(concat!("multifetch/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.handshake_timeout)
            .pool_idle_timeout(settings.idle_timeout)
            .pool_max_idle_per_host(1);
        if !endpoint.is_default_route() {
            builder = builder.local_address(endpoint.ip());
        }
        builder = trust.apply(builder);

        let client = builder.build().map_err(|e| FetchError::TransportBuild {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let path = Self {
            endpoint,
            client,
            reservation,
            settings,
            verifies_server: trust.verifies_server(),
        };
        info!(
            endpoint = %path.endpoint,
            local_addr = ?path.local_addr(),
            verifies_server = path.verifies_server,
            "Transport path bound"
        );
        Ok(path)
    }

    /// Bind one path per endpoint, in order.
    ///
    /// Paths bound before a failure are released when the error returns.
    pub fn bind_all(
        endpoints: &[LocalEndpoint],
        trust: &TrustStore,
        settings: TransportSettings,
    ) -> FetchResult<Vec<Self>> {
        endpoints
            .iter()
            .map(|endpoint| Self::bind(*endpoint, trust, settings))
            .collect()
    }

    /// The endpoint this path is bound to.
    pub fn endpoint(&self) -> &LocalEndpoint {
        &self.endpoint
    }

    /// The HTTP client for this path.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The reserved local socket address, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.reservation.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Timeouts this path was built with.
    pub fn settings(&self) -> TransportSettings {
        self.settings
    }
}

impl Drop for TransportPath {
    fn drop(&mut self) {
        debug!(endpoint = %self.endpoint, "Transport path released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_bind_loopback() {
        let endpoint = LocalEndpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let path =
            TransportPath::bind(endpoint, &TrustStore::System, TransportSettings::default())
                .unwrap();

        let local = path.local_addr().unwrap();
        assert_eq!(local.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_ne!(local.port(), 0);
        assert_eq!(path.settings(), TransportSettings::default());
    }

    #[test]
    fn test_bind_default_route_has_no_reservation() {
        let path = TransportPath::bind(
            LocalEndpoint::default_route(),
            &TrustStore::InsecureSkipVerify,
            TransportSettings::default(),
        )
        .unwrap();
        assert!(path.local_addr().is_none());
        assert!(path.endpoint().is_default_route());
    }

    #[test]
    fn test_bind_foreign_address_fails() {
        // TEST-NET-3, never assigned to a local interface.
        let endpoint: LocalEndpoint = "203.0.113.77".parse().unwrap();
        let result =
            TransportPath::bind(endpoint, &TrustStore::System, TransportSettings::default());
        assert!(matches!(result, Err(FetchError::EndpointBind { .. })));
    }

    #[test]
    fn test_bind_port_in_use_fails() {
        let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let taken = LocalEndpoint::with_port(holder.local_addr().unwrap());

        let result =
            TransportPath::bind(taken, &TrustStore::System, TransportSettings::default());
        assert!(matches!(result, Err(FetchError::EndpointBind { .. })));
    }

    #[test]
    fn test_bind_all_preserves_order() {
        let endpoints = vec![
            LocalEndpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            LocalEndpoint::default_route(),
        ];
        let paths =
            TransportPath::bind_all(&endpoints, &TrustStore::System, TransportSettings::default())
                .unwrap();
        assert_eq!(paths.len(), 2);
        assert!(!paths[0].endpoint().is_default_route());
        assert!(paths[1].endpoint().is_default_route());
    }
}
