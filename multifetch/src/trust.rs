//! Root-of-trust loading for server verification.
//!
//! A transfer either verifies the server against the built-in web PKI
//! roots, against a single pinned CA certificate read from a PEM file, or
//! (explicitly, and loudly) not at all.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::{Certificate, Client, ClientBuilder};
use tracing::{info, warn};

use crate::config::TrustConfig;
use crate::error::{FetchError, FetchResult};

const PEM_CERTIFICATE_LABEL: &str = "-----BEGIN CERTIFICATE-----";
const PEM_BEGIN: &str = "-----BEGIN ";

/// Loaded trust material, ready to apply to HTTP clients.
#[derive(Clone)]
pub enum TrustStore {
    /// Built-in web PKI roots.
    System,
    /// A single pinned CA; the built-in roots are disabled.
    Pinned {
        path: PathBuf,
        certificate: Certificate,
    },
    /// Server identity is not verified.
    InsecureSkipVerify,
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "TrustStore::System"),
            Self::Pinned { path, .. } => write!(f, "TrustStore::Pinned({})", path.display()),
            Self::InsecureSkipVerify => write!(f, "TrustStore::InsecureSkipVerify"),
        }
    }
}

impl TrustStore {
    /// Load the trust material described by `config`.
    pub fn load(config: &TrustConfig) -> FetchResult<Self> {
        match config {
            TrustConfig::System => Ok(Self::System),
            TrustConfig::Pinned(path) => Self::load_pem(path),
            TrustConfig::Insecure => {
                warn!("Server certificate verification is DISABLED");
                Ok(Self::InsecureSkipVerify)
            }
        }
    }

    /// Load a pinned CA certificate from a PEM file.
    ///
    /// The first PEM block must be a `CERTIFICATE`; keys, requests and
    /// anything that is not PEM are rejected. The certificate body is
    /// parsed here so a corrupt CA never reaches transport setup.
    pub fn load_pem(path: &Path) -> FetchResult<Self> {
        let trust_err = |reason: String| FetchError::TrustLoad {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read(path).map_err(|e| trust_err(e.to_string()))?;
        let text = std::str::from_utf8(&raw)
            .map_err(|_| trust_err("file is not PEM text".to_string()))?;

        match text.lines().map(str::trim).find(|l| l.starts_with(PEM_BEGIN)) {
            Some(PEM_CERTIFICATE_LABEL) => {}
            Some(other) => {
                return Err(trust_err(format!("expected a certificate, found {}", other)));
            }
            None => return Err(trust_err("no PEM block found".to_string())),
        }

        let certificate = Certificate::from_pem(&raw).map_err(|e| trust_err(e.to_string()))?;
        // rustls parses root certificates lazily, when a client is built.
        Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate.clone())
            .build()
            .map_err(|e| trust_err(format!("invalid certificate: {}", e)))?;
        info!(path = %path.display(), "Loaded pinned CA certificate");

        Ok(Self::Pinned {
            path: path.to_path_buf(),
            certificate,
        })
    }

    /// Whether server identity is verified at all.
    pub fn verifies_server(&self) -> bool {
        !matches!(self, Self::InsecureSkipVerify)
    }

    /// Apply this trust policy to a client builder.
    pub fn apply(&self, builder: ClientBuilder) -> ClientBuilder {
        match self {
            Self::System => builder,
            Self::Pinned { certificate, .. } => builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(certificate.clone()),
            Self::InsecureSkipVerify => builder.danger_accept_invalid_certs(true),
        }
    }
}
