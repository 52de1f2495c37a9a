use std::fmt;

use der::Encode;
use rand_core::{OsRng, RngCore};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, SecretDocument};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CaError, Result};

/// Modulus size used when the caller does not ask for one.
pub const DEFAULT_KEY_SIZE: usize = 2048;

const MIN_KEY_SIZE: usize = 1024;
const MAX_KEY_SIZE: usize = 4096;

/// An RSA key pair used either by a certificate subject or by the issuing root CA.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &"RSA")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair of [`DEFAULT_KEY_SIZE`] bits.
    pub fn generate() -> Result<Self> {
        Self::generate_rsa(DEFAULT_KEY_SIZE)
    }

    /// Generate an RSA key pair with the specified number of bits.
    ///
    /// Fails with [`CaError::Provider`] when the operating system cannot supply
    /// secure randomness, so a broken entropy source is never mistaken for bad input.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&bits) {
            return Err(CaError::validation(format!(
                "RSA key size must be between {MIN_KEY_SIZE} and {MAX_KEY_SIZE} bits, got {bits}"
            )));
        }

        let mut rng = OsRng;
        let mut probe = [0u8; 32];
        rng.try_fill_bytes(&mut probe)
            .map_err(|e| CaError::provider("secure random source is unavailable", e))?;

        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CaError::provider(format!("RSA-{bits} key generation failed"), e))?;
        let public = RsaPublicKey::from(&private);
        tracing::debug!(bits, "generated RSA key pair");

        Ok(KeyPair {
            private: Box::new(private),
            public,
        })
    }

    /// Import a key pair from a DER-encoded PKCS#8 `PrivateKeyInfo`.
    pub fn from_pkcs8_der(der: &[u8]) -> rsa::pkcs8::Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Box::new(private),
            public,
        })
    }

    /// Export the private key as DER-encoded PKCS#8.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        self.private
            .to_pkcs8_der()
            .map_err(|e| CaError::certificate_build("failed to encode private key as PKCS#8", e))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// The subject public key info for this key pair.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        spki_from_public_key(&self.public)
    }

    /// Sign `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key: SigningKey<Sha256> = SigningKey::new((*self.private).clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| CaError::certificate_build("RSA-SHA256 signing failed", e))?;
        Ok(signature.to_vec())
    }
}

/// Build the subject public key info for an RSA public key.
pub fn spki_from_public_key(public: &RsaPublicKey) -> Result<SubjectPublicKeyInfoOwned> {
    SubjectPublicKeyInfoOwned::from_key(public.clone())
        .map_err(|e| CaError::certificate_build("failed to encode subject public key info", e))
}

/// Extract the RSA public key carried by a subject public key info.
pub fn public_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<RsaPublicKey> {
    let der = spki
        .to_der()
        .map_err(|e| CaError::certificate_build("failed to encode subject public key info", e))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CaError::certificate_build("subject public key is not an RSA key", e))
}

/// RFC 5280 method 1 key identifier: SHA-1 of the subject public key bits.
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

/// Check an RSASSA-PKCS1-v1_5 SHA-256 signature.
pub fn verify_signature(
    public: &RsaPublicKey,
    data: &[u8],
    signature: &[u8],
) -> std::result::Result<(), rsa::signature::Error> {
    let verifying_key: VerifyingKey<Sha256> = VerifyingKey::new(public.clone());
    let signature = Signature::try_from(signature)?;
    verifying_key.verify(data, &signature)
}
