use std::sync::Arc;

use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::stack::Stack;
use openssl::x509::{X509, X509Ref};

use crate::cert::Certificate;
use crate::error::{CaError, Result};
use crate::issuer::IssuerMaterial;
use crate::key::KeyPair;

/// PBES2 iteration count for key and certificate bags, and for the MAC.
const PKCS12_ITERATIONS: u32 = 10_000;

/// An issued certificate, the subject's key pair and the issuer that signed it.
///
/// Containers derived from a holder never change it, so one holder can be
/// packaged any number of times under different passwords and aliases.
#[derive(Debug, Clone)]
pub struct CertificateHolder {
    certificate: Certificate,
    key_pair: KeyPair,
    issuer: Arc<IssuerMaterial>,
}

impl CertificateHolder {
    pub fn new(certificate: Certificate, key_pair: KeyPair, issuer: Arc<IssuerMaterial>) -> Self {
        Self {
            certificate,
            key_pair,
            issuer,
        }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn issuer(&self) -> &IssuerMaterial {
        &self.issuer
    }

    /// Builds a PKCS#12 container with a single private-key entry under
    /// `alias` and the chain `[leaf, root]`.
    ///
    /// Both bags are encrypted with PBES2 AES-256-CBC and the MAC is
    /// HMAC-SHA256, which current OpenSSL, curl and keytool all read.
    /// An empty password or alias is a [`CaError::KeyStore`] and nothing is
    /// encoded.
    pub fn generate_key_store(&self, password: &str, alias: &str) -> Result<Vec<u8>> {
        check_secret("password", password)?;
        check_secret("alias", alias)?;

        let leaf = to_openssl_certificate(&self.certificate)?;
        let root = to_openssl_certificate(self.issuer.certificate())?;
        let key = self.key_pair.to_pkcs8_der()?;
        let key = PKey::private_key_from_pkcs8(key.as_bytes())
            .map_err(|e| CaError::key_store_with("private key rejected by PKCS#12 encoder", e))?;

        let mut chain = Stack::new()
            .map_err(|e| CaError::key_store_with("cannot allocate certificate chain", e))?;
        chain
            .push(root)
            .map_err(|e| CaError::key_store_with("cannot add issuer to chain", e))?;

        let pkcs12 = Pkcs12::builder()
            .name(alias)
            .pkey(&key)
            .cert(&leaf)
            .ca(chain)
            .key_algorithm(Nid::AES_256_CBC)
            .cert_algorithm(Nid::AES_256_CBC)
            .key_iter(PKCS12_ITERATIONS)
            .mac_iter(PKCS12_ITERATIONS)
            .mac_md(MessageDigest::sha256())
            .build2(password)
            .map_err(|e| CaError::key_store_with("PKCS#12 encryption failed", e))?;
        let der = pkcs12
            .to_der()
            .map_err(|e| CaError::key_store_with("cannot encode PKCS#12 container", e))?;
        tracing::debug!(alias, "assembled PKCS#12 container");
        Ok(der)
    }
}

/// One named entry of an opened container.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    alias: String,
    certificate: Option<Certificate>,
    private_key: Option<KeyPair>,
}

impl ContainerEntry {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn private_key(&self) -> Option<&KeyPair> {
        self.private_key.as_ref()
    }

    pub fn is_key_entry(&self) -> bool {
        self.private_key.is_some()
    }
}

/// A decrypted PKCS#12 container.
#[derive(Debug, Clone)]
pub struct KeyContainer {
    entries: Vec<ContainerEntry>,
    // certificates without a friendly name; the issuer chain
    authorities: Vec<Certificate>,
}

impl KeyContainer {
    /// Container type reported for every container this crate reads or writes.
    pub const KIND: &'static str = "PKCS12";

    /// Checks the MAC with `password`, then decrypts every bag.
    ///
    /// Reads anything the linked OpenSSL reads: PBES2 or the legacy
    /// PKCS#12 PBE schemes, with SHA-1 or SHA-2 MACs.
    pub fn open(bytes: &[u8], password: &str) -> Result<Self> {
        check_secret("password", password)?;
        let pkcs12 = Pkcs12::from_der(bytes)
            .map_err(|e| CaError::key_store_with("corrupt PKCS#12 container", e))?;
        let parsed = pkcs12.parse2(password).map_err(|e| {
            CaError::key_store_with("wrong password or unreadable PKCS#12 container", e)
        })?;

        let mut container = KeyContainer {
            entries: Vec::new(),
            authorities: Vec::new(),
        };

        let private_key = parsed.pkey.as_deref().map(from_openssl_key).transpose()?;
        match parsed.cert {
            Some(cert) => {
                let entry = container.entry_mut(&alias_of(&cert));
                entry.certificate = Some(from_openssl_certificate(&cert)?);
                entry.private_key = private_key;
            }
            None => {
                if let Some(key_pair) = private_key {
                    container.entry_mut("").private_key = Some(key_pair);
                }
            }
        }

        for cert in parsed.ca.into_iter().flatten() {
            let certificate = from_openssl_certificate(&cert)?;
            match cert.alias() {
                Some(_) => container.entry_mut(&alias_of(&cert)).certificate = Some(certificate),
                None => container.authorities.push(certificate),
            }
        }
        Ok(container)
    }

    fn entry_mut(&mut self, alias: &str) -> &mut ContainerEntry {
        let position = match self.entries.iter().position(|e| e.alias == alias) {
            Some(position) => position,
            None => {
                self.entries.push(ContainerEntry {
                    alias: alias.to_string(),
                    certificate: None,
                    private_key: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[position]
    }

    pub fn kind(&self) -> &'static str {
        Self::KIND
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.alias.as_str())
    }

    pub fn entry(&self, alias: &str) -> Option<&ContainerEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entry(alias).is_some()
    }

    pub fn is_key_entry(&self, alias: &str) -> bool {
        self.entry(alias).is_some_and(ContainerEntry::is_key_entry)
    }

    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        self.entry(alias).and_then(ContainerEntry::certificate)
    }

    pub fn private_key(&self, alias: &str) -> Option<&KeyPair> {
        self.entry(alias).and_then(ContainerEntry::private_key)
    }

    /// The entry's certificate followed by the issuer chain.
    pub fn chain(&self, alias: &str) -> Vec<&Certificate> {
        self.certificate(alias)
            .into_iter()
            .chain(self.authorities.iter())
            .collect()
    }
}

// OpenSSL takes passwords and friendly names as C strings.
fn check_secret(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CaError::key_store(format!("container {field} must not be empty")));
    }
    if value.contains('\0') {
        return Err(CaError::key_store(format!("container {field} contains a NUL byte")));
    }
    Ok(())
}

fn alias_of(cert: &X509Ref) -> String {
    cert.alias()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default()
}

fn to_openssl_certificate(certificate: &Certificate) -> Result<X509> {
    X509::from_der(&certificate.to_der()?)
        .map_err(|e| CaError::key_store_with("certificate rejected by PKCS#12 encoder", e))
}

fn from_openssl_certificate(cert: &X509Ref) -> Result<Certificate> {
    let der = cert
        .to_der()
        .map_err(|e| CaError::key_store_with("cannot re-encode container certificate", e))?;
    Certificate::from_der(&der)
        .map_err(|e| CaError::key_store_with("container holds a malformed certificate", e))
}

fn from_openssl_key(key: &PKeyRef<Private>) -> Result<KeyPair> {
    let der = key
        .private_key_to_pkcs8()
        .map_err(|e| CaError::key_store_with("cannot export container private key", e))?;
    KeyPair::from_pkcs8_der(&der)
        .map_err(|e| CaError::key_store_with("container key is not PKCS#8 RSA", e))
}
