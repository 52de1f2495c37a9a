use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::cert::Certificate;

/// Metadata kept for every issued or uploaded container.
///
/// `id` names the container blob as well. The password is stored in clear
/// text; whoever can read the metadata store can open the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreRecord {
    pub id: Uuid,
    pub password: String,
    pub alias: String,
    pub subject_dn: String,
    pub issuer_dn: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
}

impl KeyStoreRecord {
    /// Describes `certificate` under a fresh random identifier.
    pub fn from_certificate(certificate: &Certificate, password: &str, alias: &str) -> Self {
        let validity = certificate.validity();
        Self {
            id: Uuid::new_v4(),
            password: password.to_string(),
            alias: alias.to_string(),
            subject_dn: certificate.subject_name().to_string(),
            issuer_dn: certificate.issuer_name().to_string(),
            not_before: validity.not_before,
            not_after: validity.not_after,
        }
    }

    /// File name the container is stored and downloaded under.
    pub fn container_file_name(&self) -> String {
        format!("{}.p12", self.id)
    }
}
