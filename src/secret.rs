use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore};
use uuid::Uuid;

use crate::cert::Certificate;
use crate::error::{CaError, Result};
use crate::keystore::KeyContainer;
use crate::service::KeyStoreService;
use crate::storage::{BlobStore, RecordRepository};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls the protected endpoint using a stored container as the TLS client
/// identity.
pub struct SecretClient {
    records: RecordRepository,
    containers: Arc<dyn BlobStore>,
    trust_anchor: Certificate,
    secret_url: String,
}

impl SecretClient {
    /// `trust_anchor` is the only root the server certificate may chain to.
    pub fn new(
        records: RecordRepository,
        containers: Arc<dyn BlobStore>,
        trust_anchor: Certificate,
        secret_url: impl Into<String>,
    ) -> Self {
        Self {
            records,
            containers,
            trust_anchor,
            secret_url: secret_url.into(),
        }
    }

    /// Shares the service's stores and trusts its root CA.
    pub fn from_service(service: &KeyStoreService, secret_url: impl Into<String>) -> Result<Self> {
        let trust_anchor = service.issuer().get()?.certificate().clone();
        Ok(Self::new(
            service.records().clone(),
            service.containers().clone(),
            trust_anchor,
            secret_url,
        ))
    }

    pub fn secret_url(&self) -> &str {
        &self.secret_url
    }

    /// Opens container `id` and performs one GET against the secret URL over
    /// TLS 1.3, returning the response body. No retries.
    pub fn fetch_secret(&self, id: Uuid) -> Result<String> {
        let record = self.records.get(id)?.ok_or(CaError::NotFound(id))?;
        let bytes = self
            .containers
            .get(&record.container_file_name())?
            .ok_or(CaError::NotFound(id))?;
        let container = KeyContainer::open(&bytes, &record.password)?;
        let config = self.client_config(&container, &record.alias)?;

        let client = reqwest::blocking::Client::builder()
            .use_preconfigured_tls(config)
            .http1_only()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CaError::tls("cannot build HTTPS client", e))?;

        tracing::info!(%id, url = %self.secret_url, "requesting secret");
        let response = client
            .get(&self.secret_url)
            .send()
            .map_err(|e| CaError::tls(format!("request to {} failed", self.secret_url), e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| CaError::tls("cannot read response body", e))?;
        tracing::debug!(%id, %status, "secret endpoint answered");
        Ok(body)
    }

    /// TLS 1.3 only, trusting just the root CA, presenting `alias` from
    /// `container` as the client identity.
    pub fn client_config(&self, container: &KeyContainer, alias: &str) -> Result<ClientConfig> {
        let key = container
            .private_key(alias)
            .ok_or_else(|| CaError::key_store(format!("no private key under alias {alias:?}")))?;
        let chain = container
            .chain(alias)
            .into_iter()
            .map(|certificate| certificate.to_der().map(CertificateDer::from))
            .collect::<Result<Vec<_>>>()?;
        if chain.is_empty() {
            return Err(CaError::key_store(format!(
                "no certificate under alias {alias:?}"
            )));
        }
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            key.to_pkcs8_der()?.as_bytes().to_vec(),
        ));

        let mut roots = RootCertStore::empty();
        roots
            .add(CertificateDer::from(self.trust_anchor.to_der()?))
            .map_err(|e| CaError::tls("root CA is not a usable trust anchor", e))?;

        ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| CaError::tls("TLS 1.3 is unavailable", e))?
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)
            .map_err(|e| CaError::tls("client identity rejected", e))
    }
}
