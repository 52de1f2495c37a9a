//! use clientca::error::CaError;

use thiserror::Error;
use uuid::Uuid;

/// Boxed lower-level cause kept behind every [`CaError`] for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents errors that can occur while issuing, storing or using client certificates.
///
/// Every provider or library fault is caught at the component boundary and
/// re-wrapped into one of these kinds, with the original error kept as `source`.
#[derive(Debug, Error)]
pub enum CaError {
    /// A required issuance or upload field was missing, empty or invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The cryptographic provider (secure randomness, key generation) is unavailable.
    #[error("Cryptographic provider unavailable: {context}")]
    Provider {
        context: String,
        #[source]
        source: BoxError,
    },

    /// An extension, request or certificate body could not be built or signed.
    #[error("Failed to build certificate: {context}")]
    CertificateBuild {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A freshly issued certificate failed its validity or signature self-check.
    #[error("Issued certificate failed verification: {context}")]
    CertificateVerification {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Bad or empty password, missing alias or corrupt key container.
    #[error("Key store error: {context}")]
    KeyStore {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The root CA material could not be read or parsed.
    #[error("Issuer material unavailable: {context}")]
    Issuer {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// No key store exists with the given identifier.
    #[error("Key store {0} not found")]
    NotFound(Uuid),

    /// The metadata or blob store failed.
    #[error("Storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Mutual-TLS negotiation or the authenticated request failed.
    #[error("TLS handshake or request failed: {context}")]
    TlsHandshake {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Settings could not be read or parsed.
    #[error("Configuration error: {context}")]
    Config {
        context: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl CaError {
    pub fn validation(message: impl Into<String>) -> Self {
        CaError::Validation(message.into())
    }

    pub fn provider(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::Provider {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn certificate_build(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::CertificateBuild {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn verification(context: impl Into<String>, source: Option<BoxError>) -> Self {
        CaError::CertificateVerification {
            context: context.into(),
            source,
        }
    }

    pub fn key_store(context: impl Into<String>) -> Self {
        CaError::KeyStore {
            context: context.into(),
            source: None,
        }
    }

    pub fn key_store_with(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::KeyStore {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn issuer(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::Issuer {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn storage(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::Storage {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn tls(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::TlsHandshake {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn config(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CaError::Config {
            context: context.into(),
            source: Some(source.into()),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CaError>;

impl From<der::Error> for CaError {
    fn from(e: der::Error) -> Self {
        CaError::certificate_build("DER encoding or decoding failed", e)
    }
}
