mod util;

use std::sync::Arc;

use clientca::error::CaError;
use clientca::issuer::IssuerSource;
use clientca::secret::SecretClient;
use clientca::service::{IssuanceRequest, KeyStoreService};
use clientca::storage::{ObjectBlobStore, RecordRepository};
use uuid::Uuid;

const SECRET: &str = "the quick brown fox";

fn service_for(ca: &util::TestCa) -> KeyStoreService {
    KeyStoreService::new(
        Arc::new(IssuerSource::from_material((*ca.material).clone())),
        RecordRepository::new(Arc::new(ObjectBlobStore::in_memory().unwrap())),
        Arc::new(ObjectBlobStore::in_memory().unwrap()),
    )
}

fn url(addr: std::net::SocketAddr) -> String {
    format!("https://localhost:{}/", addr.port())
}

fn issue(service: &KeyStoreService) -> Uuid {
    service
        .issue(&IssuanceRequest {
            common_name: Some("mtls-client".into()),
            organization: Some("MajaTech".into()),
            password: "testing".into(),
            alias: "test-alias".into(),
            ..Default::default()
        })
        .unwrap()
        .id
}

#[test]
fn test_fetch_secret_presents_issued_identity() {
    let ca = util::generate_ca_cert("myca.local");
    let service = service_for(&ca);
    let id = issue(&service);

    let (addr, server) = util::spawn_mtls_server(&ca.material, SECRET);
    let client = SecretClient::from_service(&service, url(addr)).unwrap();

    assert_eq!(client.fetch_secret(id).unwrap(), SECRET);
    assert_eq!(server.join().unwrap(), Ok(2));
}

#[test]
fn test_untrusted_client_certificate_is_rejected() {
    let server_ca = util::generate_ca_cert("myca.local");
    let other_ca = util::generate_ca_cert("rogue.local");

    // The client trusts the server's root but its own identity comes from
    // a root the server has never seen.
    let service = service_for(&other_ca);
    let id = issue(&service);

    let (addr, server) = util::spawn_mtls_server(&server_ca.material, SECRET);
    let client = SecretClient::new(
        service.records().clone(),
        service.containers().clone(),
        server_ca.material.certificate().clone(),
        url(addr),
    );
    let err = client.fetch_secret(id).unwrap_err();
    assert!(matches!(err, CaError::TlsHandshake { .. }), "{err:?}");
    assert!(server.join().unwrap().is_err());
}

#[test]
fn test_unknown_container_is_not_found() {
    let ca = util::generate_ca_cert("myca.local");
    let service = service_for(&ca);
    let client = SecretClient::from_service(&service, "https://localhost:1/").unwrap();

    let unknown = Uuid::new_v4();
    assert!(matches!(
        client.fetch_secret(unknown),
        Err(CaError::NotFound(id)) if id == unknown
    ));
}

#[test]
fn test_client_refuses_tls12_only_server() {
    let ca = util::generate_ca_cert("myca.local");
    let service = service_for(&ca);
    let id = issue(&service);

    let (addr, server) =
        util::spawn_mtls_server_with_versions(&ca.material, SECRET, &[&rustls::version::TLS12]);
    let client = SecretClient::from_service(&service, url(addr)).unwrap();

    let err = client.fetch_secret(id).unwrap_err();
    assert!(matches!(err, CaError::TlsHandshake { .. }), "{err:?}");
    assert!(server.join().unwrap().is_err());
}

#[test]
fn test_client_config_presents_key_entry() {
    let ca = util::generate_ca_cert("myca.local");
    let service = service_for(&ca);
    let id = issue(&service);
    let client = SecretClient::from_service(&service, "https://localhost:1/").unwrap();

    let bytes = service.download(id).unwrap();
    let container = clientca::keystore::KeyContainer::open(&bytes, "testing").unwrap();
    let config = client.client_config(&container, "test-alias").unwrap();
    assert!(config.client_auth_cert_resolver.has_certs());

    assert!(matches!(
        client.client_config(&container, "missing"),
        Err(CaError::KeyStore { .. })
    ));
}
