#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use clientca::cert::Certificate;
use clientca::cert::SignatureAlgorithm;
use clientca::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use clientca::cert::params::{DistinguishedName, ExtensionParam, Validity};
use clientca::csr::CertificateSigningRequest;
use clientca::error::Result;
use clientca::issuer::IssuerMaterial;
use clientca::key::{KeyPair, key_identifier};
use clientca::signer::{CertificateProfile, CertificateSigner};
use clientca::tbs_certificate::TbsCertificate;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    RootCertStore, ServerConfig, ServerConnection, StreamOwned, SupportedProtocolVersion,
};
use tempfile::TempDir;

/// A throwaway root CA written to disk the way a deployment provides it:
/// PEM certificate and PKCS#8 DER private key.
pub struct TestCa {
    pub dir: TempDir,
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub material: Arc<IssuerMaterial>,
}

pub fn generate_ca_cert(common_name: &str) -> TestCa {
    let ca_key = KeyPair::generate_rsa(2048).unwrap();
    let ca_spki = ca_key.as_spki().unwrap();
    let ca_name = DistinguishedName::builder()
        .common_name(common_name)
        .organization("MajaTech")
        .country("AU")
        .build()
        .as_x509_name()
        .unwrap();

    let ca_cert = TbsCertificate {
        serial_number: vec![0x01],
        signature_algorithm: SignatureAlgorithm::Sha256WithRSA,
        issuer: ca_name.clone(),
        validity: Validity::for_days(30),
        subject: ca_name,
        subject_public_key_info: ca_spki.clone(),
        extensions: vec![
            ExtensionParam::from_extension(
                BasicConstraints {
                    is_ca: true,
                    max_path_length: None,
                },
                true,
            )
            .unwrap(),
            ExtensionParam::from_extension(
                KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign),
                true,
            )
            .unwrap(),
            ExtensionParam::from_extension(
                SubjectKeyIdentifier {
                    key_identifier: key_identifier(&ca_spki),
                },
                false,
            )
            .unwrap(),
        ],
    }
    .sign(&ca_key)
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let certificate_path = dir.path().join("rootca.pem");
    let private_key_path = dir.path().join("private.der");
    std::fs::write(&certificate_path, ca_cert.to_pem().unwrap()).unwrap();
    std::fs::write(&private_key_path, ca_key.to_pkcs8_der().unwrap().as_bytes()).unwrap();

    let material = Arc::new(IssuerMaterial::new(ca_cert, ca_key).unwrap());
    TestCa {
        dir,
        certificate_path,
        private_key_path,
        material,
    }
}

pub fn client_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .common_name("test-cn")
        .locality("Sydney")
        .state("NSW")
        .country("AU")
        .organization("MajaTech")
        .organizational_unit("CA")
        .build()
}

/// TLS server certificates, only needed to stand up a test endpoint.
pub struct ServerAuth {
    pub dns_names: Vec<String>,
}

impl CertificateProfile for ServerAuth {
    fn key_usage(&self) -> KeyUsage {
        KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
    }

    fn extended_key_usage(&self) -> ExtendedKeyUsage {
        ExtendedKeyUsage {
            usage: vec![ExtendedKeyUsageOption::ServerAuth],
        }
    }

    fn additional_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let san = SubjectAltName {
            names: self.dns_names.clone(),
        };
        Ok(vec![ExtensionParam::from_extension(san, false)?])
    }
}

type ServerHandle = JoinHandle<std::result::Result<usize, String>>;

/// Serves exactly one HTTPS request on 127.0.0.1 over TLS 1.3, requiring a
/// client certificate issued by `ca`. The join handle yields the number of
/// client certificates presented, or the server-side error.
pub fn spawn_mtls_server(ca: &IssuerMaterial, body: &'static str) -> (SocketAddr, ServerHandle) {
    spawn_mtls_server_with_versions(ca, body, &[&rustls::version::TLS13])
}

/// Like [`spawn_mtls_server`], restricted to `versions`.
pub fn spawn_mtls_server_with_versions(
    ca: &IssuerMaterial,
    body: &'static str,
    versions: &[&'static SupportedProtocolVersion],
) -> (SocketAddr, ServerHandle) {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let server_csr = CertificateSigningRequest::new(
        DistinguishedName::builder().common_name("localhost").build(),
    )
    .unwrap();
    let server = CertificateSigner::new(ServerAuth {
        dns_names: vec!["localhost".to_string()],
    })
    .sign(server_csr, Arc::new(ca.clone()))
    .unwrap();

    let chain = vec![
        CertificateDer::from(server.certificate().to_der().unwrap()),
        CertificateDer::from(ca.certificate().to_der().unwrap()),
    ];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        server.key_pair().to_pkcs8_der().unwrap().as_bytes().to_vec(),
    ));

    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from(ca.certificate().to_der().unwrap()))
        .unwrap();
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .unwrap();
    let config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)
        .unwrap()
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .unwrap();
    let config = Arc::new(config);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let (tcp, _) = listener.accept().map_err(|e| e.to_string())?;
        tcp.set_read_timeout(Some(Duration::from_secs(10)))
            .map_err(|e| e.to_string())?;
        let conn = ServerConnection::new(config).map_err(|e| e.to_string())?;
        let mut tls = StreamOwned::new(conn, tcp);

        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = tls.read(&mut chunk).map_err(|e| e.to_string())?;
            if n == 0 {
                return Err("connection closed before request".to_string());
            }
            request.extend_from_slice(&chunk[..n]);
        }
        if !request.starts_with(b"GET / HTTP/1.1\r\n") {
            return Err(format!(
                "unexpected request line: {}",
                String::from_utf8_lossy(&request)
            ));
        }

        let presented = tls.conn.peer_certificates().map_or(0, |certs| certs.len());
        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            body.len(),
            body
        );
        tls.write_all(response.as_bytes()).map_err(|e| e.to_string())?;
        tls.conn.send_close_notify();
        tls.flush().map_err(|e| e.to_string())?;
        Ok(presented)
    });

    (addr, handle)
}

/// DER of a certificate, for comparisons across crates.
pub fn der(certificate: &Certificate) -> Vec<u8> {
    certificate.to_der().unwrap()
}
