use std::sync::Arc;

use uuid::Uuid;

use crate::cert::params::DistinguishedName;
use crate::config::Settings;
use crate::csr::CertificateSigningRequest;
use crate::error::{CaError, Result};
use crate::issuer::IssuerSource;
use crate::key::DEFAULT_KEY_SIZE;
use crate::keystore::KeyContainer;
use crate::record::KeyStoreRecord;
use crate::signer::CertificateSigner;
use crate::storage::{self, BlobStore, RecordRepository};

/// Input for a new client certificate.
#[derive(Debug, Clone, Default)]
pub struct IssuanceRequest {
    pub common_name: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub password: String,
    pub alias: String,
}

impl IssuanceRequest {
    /// The requested subject. Empty fields count as absent.
    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::builder()
            .maybe_common_name(present(&self.common_name))
            .maybe_locality(present(&self.locality))
            .maybe_state(present(&self.state))
            .maybe_country(present(&self.country))
            .maybe_organization(present(&self.organization))
            .maybe_organizational_unit(present(&self.organizational_unit))
            .build()
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Issues, imports and manages stored key containers.
///
/// Each container is two writes: its [`KeyStoreRecord`] and its bytes under
/// `{id}.p12`. When the second write fails the first is undone.
pub struct KeyStoreService {
    issuer: Arc<IssuerSource>,
    signer: CertificateSigner,
    records: RecordRepository,
    containers: Arc<dyn BlobStore>,
    key_size: usize,
}

impl KeyStoreService {
    pub fn new(
        issuer: Arc<IssuerSource>,
        records: RecordRepository,
        containers: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            issuer,
            signer: CertificateSigner::client_auth(),
            records,
            containers,
            key_size: DEFAULT_KEY_SIZE,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let issuer = Arc::new(IssuerSource::new(
            &settings.issuer.certificate,
            &settings.issuer.private_key,
        ));
        let records = RecordRepository::new(storage::open(&settings.storage.metadata)?);
        let containers = storage::open(&settings.storage.containers)?;
        Ok(Self::new(issuer, records, containers).with_key_size(settings.issuer.key_size))
    }

    /// Modulus size of generated subject keys.
    pub fn with_key_size(mut self, bits: usize) -> Self {
        self.key_size = bits;
        self
    }

    pub fn issuer(&self) -> &Arc<IssuerSource> {
        &self.issuer
    }

    pub fn records(&self) -> &RecordRepository {
        &self.records
    }

    pub fn containers(&self) -> &Arc<dyn BlobStore> {
        &self.containers
    }

    /// Generates a key pair, has the root CA sign it and stores the resulting
    /// container.
    pub fn issue(&self, request: &IssuanceRequest) -> Result<KeyStoreRecord> {
        require("password", &request.password)?;
        require("alias", &request.alias)?;

        let issuer = self.issuer.get()?;
        let csr = CertificateSigningRequest::with_key_size(request.subject(), self.key_size)?;
        let holder = self.signer.sign(csr, issuer)?;
        let container = holder.generate_key_store(&request.password, &request.alias)?;

        let record = KeyStoreRecord::from_certificate(
            holder.certificate(),
            &request.password,
            &request.alias,
        );
        self.persist(&record, &container)?;
        tracing::info!(id = %record.id, subject = %record.subject_dn, "issued key store");
        Ok(record)
    }

    /// Stores a container produced elsewhere.
    ///
    /// It must open with `password`, hold a certificate under `alias`, and
    /// that certificate must be valid now. Nothing is written otherwise.
    pub fn upload(&self, bytes: &[u8], password: &str, alias: &str) -> Result<KeyStoreRecord> {
        require("password", password)?;
        require("alias", alias)?;

        let container = KeyContainer::open(bytes, password)?;
        let certificate = container.certificate(alias).ok_or_else(|| {
            CaError::validation(format!("no X.509 certificate under alias {alias:?}"))
        })?;
        certificate.check_validity().map_err(|e| {
            tracing::warn!(alias, error = %e, "rejected upload");
            CaError::validation("Certificate is not valid. Please check the expiry")
        })?;

        let record = KeyStoreRecord::from_certificate(certificate, password, alias);
        self.persist(&record, bytes)?;
        tracing::info!(id = %record.id, subject = %record.subject_dn, "uploaded key store");
        Ok(record)
    }

    pub fn get(&self, id: Uuid) -> Result<KeyStoreRecord> {
        self.records.get(id)?.ok_or(CaError::NotFound(id))
    }

    /// Every record, newest first.
    pub fn list(&self) -> Result<Vec<KeyStoreRecord>> {
        let mut records = self.records.list()?;
        records.sort_by(|a, b| b.not_before.cmp(&a.not_before));
        Ok(records)
    }

    /// The stored container bytes.
    pub fn download(&self, id: Uuid) -> Result<Vec<u8>> {
        let record = self.get(id)?;
        self.containers
            .get(&record.container_file_name())?
            .ok_or(CaError::NotFound(id))
    }

    /// Removes the record and then the container. Unknown ids change nothing.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let record = self.get(id)?;
        self.records.delete(id)?;
        match self.containers.delete(&record.container_file_name()) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%id, "container was already missing"),
            Err(e) => {
                if let Err(restore) = self.records.put(&record) {
                    tracing::error!(%id, error = %restore, "could not restore record");
                }
                return Err(e);
            }
        }
        tracing::info!(%id, "deleted key store");
        Ok(())
    }

    fn persist(&self, record: &KeyStoreRecord, container: &[u8]) -> Result<()> {
        self.records.put(record)?;
        if let Err(e) = self.containers.put(&record.container_file_name(), container) {
            match self.records.delete(record.id) {
                Ok(_) => {
                    tracing::warn!(id = %record.id, "container write failed, record removed")
                }
                Err(cleanup) => tracing::error!(
                    id = %record.id,
                    error = %cleanup,
                    "orphaned record left behind"
                ),
            }
            return Err(e);
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CaError::validation(format!("{field} is required")));
    }
    Ok(())
}
