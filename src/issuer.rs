use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;
use crate::error::{CaError, Result};
use crate::key::KeyPair;
use crate::pem_utils::pem_to_der;

/// The root CA certificate and the private key that signs with it.
///
/// Read-only once constructed; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct IssuerMaterial {
    certificate: Certificate,
    key_pair: KeyPair,
}

impl IssuerMaterial {
    /// Pairs a root certificate with its private key.
    ///
    /// Fails with [`CaError::Issuer`] when the certificate does not carry the
    /// key's public half.
    pub fn new(certificate: Certificate, key_pair: KeyPair) -> Result<Self> {
        let certified = certificate
            .public_key()
            .map_err(|e| CaError::issuer("root certificate does not hold an RSA key", e))?;
        if &certified != key_pair.public_key() {
            return Err(CaError::Issuer {
                context: "root certificate and private key do not match".to_string(),
                source: None,
            });
        }
        Ok(Self {
            certificate,
            key_pair,
        })
    }

    /// Parses a PEM root certificate and a PKCS#8 DER private key.
    pub fn from_pem_and_der(certificate_pem: &str, private_key_der: &[u8]) -> Result<Self> {
        let der = pem_to_der(certificate_pem, "CERTIFICATE")
            .map_err(|e| CaError::issuer("root certificate is not a PEM certificate", e))?;
        let certificate = Certificate::from_der(&der)
            .map_err(|e| CaError::issuer("root certificate could not be parsed", e))?;
        let key_pair = KeyPair::from_pkcs8_der(private_key_der)
            .map_err(|e| CaError::issuer("root private key is not PKCS#8 RSA", e))?;
        Self::new(certificate, key_pair)
    }

    /// Reads the trust anchors from disk.
    pub fn load(certificate_path: &Path, private_key_path: &Path) -> Result<Self> {
        let certificate_pem = std::fs::read_to_string(certificate_path).map_err(|e| {
            CaError::issuer(
                format!("cannot read root certificate {}", certificate_path.display()),
                e,
            )
        })?;
        let private_key_der = std::fs::read(private_key_path).map_err(|e| {
            CaError::issuer(
                format!("cannot read root private key {}", private_key_path.display()),
                e,
            )
        })?;
        let material = Self::from_pem_and_der(&certificate_pem, &private_key_der)?;
        tracing::info!(
            issuer = %material.issuer_dn(),
            certificate = %certificate_path.display(),
            "loaded issuer material"
        );
        Ok(material)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Issuer name for issued certificates: the root's subject, verbatim.
    pub fn distinguished_name(&self) -> &Name {
        self.certificate.subject_name()
    }

    pub fn issuer_dn(&self) -> DistinguishedName {
        self.certificate.subject()
    }
}

/// Lazily loaded issuer material.
///
/// The first [`IssuerSource::get`] reads the files; concurrent callers block
/// until that load finishes and never see partial material. A failed load is
/// not cached, so a later call retries.
#[derive(Debug)]
pub struct IssuerSource {
    certificate_path: PathBuf,
    private_key_path: PathBuf,
    material: OnceCell<Arc<IssuerMaterial>>,
}

impl IssuerSource {
    pub fn new(certificate_path: impl Into<PathBuf>, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            certificate_path: certificate_path.into(),
            private_key_path: private_key_path.into(),
            material: OnceCell::new(),
        }
    }

    /// A source that is already loaded.
    pub fn from_material(material: IssuerMaterial) -> Self {
        Self {
            certificate_path: PathBuf::new(),
            private_key_path: PathBuf::new(),
            material: OnceCell::with_value(Arc::new(material)),
        }
    }

    pub fn get(&self) -> Result<Arc<IssuerMaterial>> {
        self.material
            .get_or_try_init(|| {
                IssuerMaterial::load(&self.certificate_path, &self.private_key_path).map(Arc::new)
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::SignatureAlgorithm;
    use crate::cert::params::Validity;
    use crate::tbs_certificate::TbsCertificate;
    use std::sync::Barrier;

    fn self_signed(key: &KeyPair) -> Certificate {
        let name = DistinguishedName::builder()
            .common_name("issuer unit root")
            .build()
            .as_x509_name()
            .unwrap();
        TbsCertificate {
            serial_number: vec![7],
            signature_algorithm: SignatureAlgorithm::Sha256WithRSA,
            issuer: name.clone(),
            validity: Validity::for_days(1),
            subject: name,
            subject_public_key_info: key.as_spki().unwrap(),
            extensions: vec![],
        }
        .sign(key)
        .unwrap()
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let other = KeyPair::generate_rsa(1024).unwrap();
        let err = IssuerMaterial::new(self_signed(&key), other).unwrap_err();
        assert!(matches!(err, CaError::Issuer { .. }));
    }

    fn write_root(dir: &Path) -> (PathBuf, PathBuf) {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let cert_path = dir.join("rootca.pem");
        let key_path = dir.join("private.der");
        std::fs::write(&cert_path, self_signed(&key).to_pem().unwrap()).unwrap();
        std::fs::write(&key_path, key.to_pkcs8_der().unwrap().as_bytes()).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn test_lazy_load_reads_once() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, key_path) = write_root(dir.path());

        let source = IssuerSource::new(&cert_path, &key_path);
        let first = source.get().unwrap();
        std::fs::remove_file(&cert_path).unwrap();
        let second = source.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.issuer_dn().common_name(), Some("issuer unit root"));
    }

    #[test]
    fn test_concurrent_first_load_yields_one_material() {
        const THREADS: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, key_path) = write_root(dir.path());
        let source = IssuerSource::new(&cert_path, &key_path);
        let barrier = Barrier::new(THREADS);

        let loaded: Vec<Arc<IssuerMaterial>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        source.get().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for material in &loaded[1..] {
            assert!(Arc::ptr_eq(&loaded[0], material));
        }
        assert_eq!(loaded[0].issuer_dn().common_name(), Some("issuer unit root"));
    }

    #[test]
    fn test_missing_files_are_issuer_errors() {
        let source = IssuerSource::new("/nonexistent/rootca.pem", "/nonexistent/private.der");
        assert!(matches!(source.get(), Err(CaError::Issuer { .. })));
    }
}
