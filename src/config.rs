use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CaError, Result};
use crate::key::DEFAULT_KEY_SIZE;

/// Settings file contents.
///
/// ```toml
/// secret_url = "https://secret.example.com:8443/"
///
/// [issuer]
/// certificate = "/etc/clientca/rootca.pem"
/// private_key = "/etc/clientca/private.der"
///
/// [storage.metadata]
/// backend = "filesystem"
/// path = "/var/lib/clientca/records"
///
/// [storage.containers]
/// backend = "s3"
/// bucket = "clientca-containers"
/// region = "ap-southeast-2"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Endpoint called by the mutual-TLS bootstrap
    pub secret_url: String,

    pub issuer: IssuerSettings,

    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerSettings {
    /// PEM root certificate
    pub certificate: PathBuf,

    /// PKCS#8 DER root private key
    pub private_key: PathBuf,

    /// Modulus size for subject keys
    #[serde(default = "default_key_size")]
    pub key_size: usize,
}

fn default_key_size() -> usize {
    DEFAULT_KEY_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    /// Where key-store records go
    pub metadata: StorageBackend,

    /// Where container bytes go
    pub containers: StorageBackend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem {
        path: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Process-local; contents vanish on exit.
    Memory,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CaError::config("invalid settings", e))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaError::config(format!("cannot read {}", path.display()), e))?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_documented_example() {
        let settings = Settings::from_toml(
            r#"
            secret_url = "https://secret.example.com:8443/"

            [issuer]
            certificate = "/etc/clientca/rootca.pem"
            private_key = "/etc/clientca/private.der"

            [storage.metadata]
            backend = "filesystem"
            path = "/var/lib/clientca/records"

            [storage.containers]
            backend = "s3"
            bucket = "clientca-containers"
            region = "ap-southeast-2"
            "#,
        )
        .unwrap();

        assert_eq!(settings.issuer.key_size, 2048);
        assert_eq!(
            settings.storage.metadata,
            StorageBackend::Filesystem {
                path: "/var/lib/clientca/records".into()
            }
        );
        assert_eq!(
            settings.storage.containers,
            StorageBackend::S3 {
                bucket: "clientca-containers".into(),
                region: "ap-southeast-2".into(),
                prefix: None,
            }
        );
    }

    #[test]
    fn test_memory_backend_and_bad_input() {
        let settings = Settings::from_toml(
            r#"
            secret_url = "https://localhost/"
            [issuer]
            certificate = "root.pem"
            private_key = "root.der"
            key_size = 3072
            [storage.metadata]
            backend = "memory"
            [storage.containers]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(settings.issuer.key_size, 3072);
        assert_eq!(settings.storage.metadata, StorageBackend::Memory);

        assert!(matches!(
            Settings::from_toml("secret_url = 1"),
            Err(CaError::Config { .. })
        ));
    }
}
