use std::sync::Arc;

use rand::TryRngCore;
use rand::rngs::OsRng;
use time::OffsetDateTime;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, ExtendedKeyUsage, ExtendedKeyUsageOption, FlagSet, KeyUsage, KeyUsages,
    SubjectKeyIdentifier,
};
use crate::cert::params::{ExtensionParam, Validity};
use crate::csr::CertificateSigningRequest;
use crate::error::{CaError, Result};
use crate::issuer::IssuerMaterial;
use crate::key::key_identifier;
use crate::keystore::CertificateHolder;
use crate::tbs_certificate::TbsCertificate;

/// Lifetime of every issued certificate.
pub const VALIDITY_DAYS: i64 = 365;

const SERIAL_NUMBER_LEN: usize = 16;

/// A class of certificate the CA can issue.
///
/// A profile only chooses usages; serial, validity, identifiers, signing and
/// the post-signature check are shared by every profile in
/// [`CertificateSigner::sign`].
pub trait CertificateProfile {
    fn key_usage(&self) -> KeyUsage;

    fn extended_key_usage(&self) -> ExtendedKeyUsage;

    /// Extra extensions appended after the standard set.
    fn additional_extensions(&self) -> Result<Vec<ExtensionParam>> {
        Ok(Vec::new())
    }
}

/// Mutual-TLS client certificates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAuth;

impl CertificateProfile for ClientAuth {
    fn key_usage(&self) -> KeyUsage {
        let flags: FlagSet<KeyUsages> =
            KeyUsages::DigitalSignature | KeyUsages::NonRepudiation | KeyUsages::KeyEncipherment;
        KeyUsage(flags)
    }

    fn extended_key_usage(&self) -> ExtendedKeyUsage {
        ExtendedKeyUsage {
            usage: vec![ExtendedKeyUsageOption::ClientAuth],
        }
    }
}

/// Turns a certification request into a certificate signed by the root CA.
#[derive(Debug, Clone, Default)]
pub struct CertificateSigner<P: CertificateProfile = ClientAuth> {
    profile: P,
}

impl CertificateSigner<ClientAuth> {
    pub fn client_auth() -> Self {
        Self::new(ClientAuth)
    }
}

impl<P: CertificateProfile> CertificateSigner<P> {
    pub fn new(profile: P) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    /// Signs `csr` with the issuer's key.
    ///
    /// The certificate is checked against the current time and the issuer's
    /// public key before it is returned; either failure is a
    /// [`CaError::CertificateVerification`].
    pub fn sign(
        &self,
        csr: CertificateSigningRequest,
        issuer: Arc<IssuerMaterial>,
    ) -> Result<CertificateHolder> {
        let serial_number = random_serial_number()?;
        let validity = Validity::for_days(VALIDITY_DAYS);
        let subject = csr.subject().clone();
        let (request, key_pair) = csr.into_parts();

        let issuer_spki = issuer.key_pair().as_spki()?;
        let subject_spki = request.info.public_key;

        let mut extensions = vec![
            ExtensionParam::from_extension(self.profile.key_usage(), false)?,
            ExtensionParam::from_extension(self.profile.extended_key_usage(), true)?,
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: key_identifier(&issuer_spki),
                },
                false,
            )?,
            ExtensionParam::from_extension(
                SubjectKeyIdentifier {
                    key_identifier: key_identifier(&subject_spki),
                },
                false,
            )?,
        ];
        extensions.extend(self.profile.additional_extensions()?);

        let tbs = TbsCertificate {
            serial_number,
            signature_algorithm: SignatureAlgorithm::Sha256WithRSA,
            issuer: issuer.distinguished_name().clone(),
            validity,
            subject: request.info.subject,
            subject_public_key_info: subject_spki,
            extensions,
        };
        let certificate = tbs.sign(issuer.key_pair())?;

        certificate
            .check_validity_at(OffsetDateTime::now_utc())
            .and_then(|()| certificate.verify_signature(issuer.key_pair().public_key()))
            .map_err(|e| match e {
                e @ CaError::CertificateVerification { .. } => e,
                other => CaError::verification(
                    "issued certificate self-check failed",
                    Some(other.into()),
                ),
            })?;

        tracing::info!(
            subject = %subject,
            issuer = %issuer.issuer_dn(),
            serial = %hex::encode(certificate.serial_number()),
            "issued certificate"
        );
        Ok(CertificateHolder::new(certificate, key_pair, issuer))
    }
}

/// 128 random bits as a non-negative DER integer. A leading zero octet is
/// added when the top bit is set, so the encoding is 16 or 17 octets.
fn random_serial_number() -> Result<Vec<u8>> {
    let mut random = [0u8; SERIAL_NUMBER_LEN];
    OsRng
        .try_fill_bytes(&mut random)
        .map_err(|e| CaError::provider("secure random source is unavailable", e))?;

    let mut serial = Vec::with_capacity(SERIAL_NUMBER_LEN + 1);
    if random[0] & 0x80 != 0 {
        serial.push(0x00);
    }
    serial.extend_from_slice(&random);
    Ok(serial)
}
