//! # clientca - A Minimal Client-Certificate Authority
//!
//! clientca issues short-lived mutual-TLS client certificates from a root CA,
//! packages each one as a password-protected PKCS#12 container, keeps the
//! containers in a configurable store, and can use a stored container to call
//! a protected HTTPS endpoint. Certificates are built and signed with
//! rustcrypto libraries.
//!
//! ## Issuance Pipeline
//!
//! 1. A [`DistinguishedName`](cert::params::DistinguishedName) names the subject.
//! 2. A [`CertificateSigningRequest`](csr::CertificateSigningRequest) binds a
//!    fresh RSA key pair to that name.
//! 3. The [`CertificateSigner`](signer::CertificateSigner) signs it with the
//!    root CA's key: 128-bit random serial, one-year validity, key usage,
//!    client-auth extended key usage, authority and subject key identifiers.
//!    The result is checked against the clock and the root's public key
//!    before it is handed out.
//! 4. The [`CertificateHolder`](keystore::CertificateHolder) assembles a
//!    PKCS#12 container with chain `[leaf, root]`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use clientca::{
//!     cert::params::DistinguishedName,
//!     csr::CertificateSigningRequest,
//!     issuer::IssuerMaterial,
//!     signer::CertificateSigner,
//! };
//!
//! # fn main() -> Result<(), clientca::error::CaError> {
//! let issuer = Arc::new(IssuerMaterial::load(
//!     "/ca/rootca.pem".as_ref(),
//!     "/ca/private.der".as_ref(),
//! )?);
//!
//! let subject = DistinguishedName::builder()
//!     .common_name("alice")
//!     .organization("Example Corp")
//!     .country("AU")
//!     .build();
//!
//! let csr = CertificateSigningRequest::new(subject)?;
//! let holder = CertificateSigner::client_auth().sign(csr, issuer)?;
//! let p12 = holder.generate_key_store("changeit", "alice")?;
//! std::fs::write("alice.p12", p12).ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: RSA key generation, PKCS#8 import/export and signing
//! - [`cert`]: Certificate wrapper, distinguished names and X.509 extensions
//! - [`tbs_certificate`]: The to-be-signed certificate body
//! - [`csr`]: PKCS#10 certification requests
//! - [`issuer`]: Root CA material and its lazy loader
//! - [`signer`]: Certificate profiles and the shared signing procedure
//! - [`keystore`]: PKCS#12 container assembly and opening
//! - [`record`], [`storage`], [`service`]: Persistence of issued containers
//! - [`secret`]: Mutual-TLS client for the protected endpoint
//! - [`config`]: TOML settings
//! - [`error`]: The crate error type

pub mod cert;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod keystore;
pub mod pem_utils;
pub mod record;
pub mod secret;
pub mod service;
pub mod signer;
pub mod storage;
pub mod tbs_certificate;
