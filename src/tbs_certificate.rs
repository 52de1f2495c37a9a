use der::Encode;
use der::asn1::{BitString, OctetString, UtcTime};
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{CaError, Result};
use crate::key::KeyPair;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 v3 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial number; must encode a positive integer.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, copied byte-for-byte into the certificate.
/// * `validity` - The `notBefore`/`notAfter` window.
/// * `subject` - The subject name.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions, in the order they are encoded.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let algorithm_id: AlgorithmIdentifierOwned = self.signature_algorithm.clone().into();

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
                self.validity.not_before.into(),
            )?),
            not_after: x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
                self.validity.not_after.into(),
            )?),
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| CaError::certificate_build("invalid serial number", e))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: algorithm_id,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }

    /// Signs the TBS body with `signing_key` and assembles the certificate.
    pub fn sign(&self, signing_key: &KeyPair) -> Result<Certificate> {
        let tbs_certificate = self.to_tbs_certificate_inner()?;
        let signature = signing_key.sign(&tbs_certificate.to_der()?)?;

        let inner = CertificateInner {
            tbs_certificate,
            signature_algorithm: self.signature_algorithm.clone().into(),
            signature: BitString::from_bytes(&signature)?,
        };
        Ok(Certificate { inner })
    }
}
