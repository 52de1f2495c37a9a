pub mod extensions;
pub mod params;

use der::asn1::Any;
use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::ToAndFromX509Extension;
use params::{DistinguishedName, ExtensionParam, Validity};
use rsa::RsaPublicKey;
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::error::{CaError, Result};
use crate::key;

/// Represents the supported signature algorithms for certificates.
///
/// Every certificate and request this crate produces is signed with
/// RSASSA-PKCS1-v1_5 over SHA-256.
#[derive(Debug, Clone)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA algorithm identifiers carry an explicit NULL parameter (RFC 4055);
    /// webpki rejects the form without it.
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats
/// and to inspect the fields the CA cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Self { inner })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = CertificateInner::from_pem(pem)?;
        Ok(Self { inner })
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        Ok(self.inner.to_pem(pkcs8::LineEnding::LF)?)
    }

    pub fn subject_name(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer_name(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.subject_name())
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.issuer_name())
    }

    /// Big-endian serial number bytes.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: OffsetDateTime::from(validity.not_before.to_system_time()),
            not_after: OffsetDateTime::from(validity.not_after.to_system_time()),
        }
    }

    pub fn public_key(&self) -> Result<RsaPublicKey> {
        key::public_key_from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Raw extensions, in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the extension of type `E`, with its criticality, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<(bool, E)>> {
        self.extensions()
            .into_iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| Ok((ext.critical, ext.to_extension::<E>()?)))
            .transpose()
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &RsaPublicKey) -> Result<()> {
        let algorithm = self.inner.signature_algorithm.oid;
        if algorithm != const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
            return Err(CaError::verification(
                format!("unsupported signature algorithm {algorithm}"),
                None,
            ));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::verification("signature bit string is not octet aligned", None)
        })?;
        key::verify_signature(issuer_key, &tbs, signature).map_err(|e| {
            CaError::verification("signature does not match issuer key", Some(e.into()))
        })
    }

    /// Checks that `instant` lies inside the validity window.
    pub fn check_validity_at(&self, instant: OffsetDateTime) -> Result<()> {
        let validity = self.validity();
        if instant < validity.not_before {
            return Err(CaError::verification(
                format!("certificate is not valid before {}", validity.not_before),
                None,
            ));
        }
        if instant > validity.not_after {
            return Err(CaError::verification(
                format!("certificate expired at {}", validity.not_after),
                None,
            ));
        }
        Ok(())
    }

    pub fn check_validity(&self) -> Result<()> {
        self.check_validity_at(OffsetDateTime::now_utc())
    }
}
