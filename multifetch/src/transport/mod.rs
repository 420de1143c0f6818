//! Local-endpoint-bound transport paths.
//!
//! A [`TransportPath`] is one egress route: a reserved local address plus an
//! HTTPS client whose outbound connections originate from that address. One
//! path per physical uplink lets a job aggregate their throughput.

mod endpoint;
mod path;

pub use endpoint::{EndpointParseError, LocalEndpoint};
pub use path::{TransportPath, TransportSettings};
