use der::asn1::BitString;
use der::{Decode, Encode};
use rsa::RsaPublicKey;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::DistinguishedName;
use crate::error::{CaError, Result};
use crate::key::{self, DEFAULT_KEY_SIZE, KeyPair};
use crate::pem_utils::der_to_pem;

/// A PKCS#10 certification request together with the key pair that produced it.
///
/// The subject key is generated fresh for every request and never leaves the
/// process except inside the PKCS#12 container built from the signed certificate.
#[derive(Debug, Clone)]
pub struct CertificateSigningRequest {
    request: CertReq,
    subject: DistinguishedName,
    key_pair: KeyPair,
}

impl CertificateSigningRequest {
    /// Generates an RSA-2048 key pair and a self-signed request for `subject`.
    pub fn new(subject: DistinguishedName) -> Result<Self> {
        Self::with_key_size(subject, DEFAULT_KEY_SIZE)
    }

    pub fn with_key_size(subject: DistinguishedName, bits: usize) -> Result<Self> {
        let key_pair = KeyPair::generate_rsa(bits)?;
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key_pair.as_spki()?,
            attributes: Default::default(),
        };

        let signature = key_pair.sign(&info.to_der()?)?;
        let request = CertReq {
            info,
            algorithm: AlgorithmIdentifierOwned::from(SignatureAlgorithm::Sha256WithRSA),
            signature: BitString::from_bytes(&signature)?,
        };
        tracing::debug!(subject = %subject, bits, "created certification request");

        Ok(Self {
            request,
            subject,
            key_pair,
        })
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        self.key_pair.public_key()
    }

    pub(crate) fn into_parts(self) -> (CertReq, KeyPair) {
        (self.request, self.key_pair)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.request.to_der()?)
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(der_to_pem(&self.to_der()?, "CERTIFICATE REQUEST"))
    }

    /// Checks the request's proof of possession: its signature against the
    /// public key it carries.
    pub fn verify(&self) -> Result<()> {
        verify_request(&self.request)
    }
}

/// Verifies a DER-encoded PKCS#10 request's self-signature.
pub fn verify_request_der(der: &[u8]) -> Result<()> {
    verify_request(&CertReq::from_der(der)?)
}

fn verify_request(request: &CertReq) -> Result<()> {
    let public = key::public_key_from_spki(&request.info.public_key)?;
    let info = request.info.to_der()?;
    let signature = request
        .signature
        .as_bytes()
        .ok_or_else(|| CaError::validation("request signature is not octet aligned"))?;
    key::verify_signature(&public, &info, signature)
        .map_err(|e| CaError::validation(format!("request signature is invalid: {e}")))
}
