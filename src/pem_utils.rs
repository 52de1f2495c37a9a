use crate::error::{CaError, Result};

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new())
}

/// Convert a PEM-encoded string to DER-encoded bytes, checking the block label.
pub fn pem_to_der(pem_str: &str, expected_label: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str).map_err(|e| CaError::certificate_build("malformed PEM", e))?;
    if pem.tag() != expected_label {
        return Err(CaError::validation(format!(
            "expected PEM block {expected_label:?}, found {:?}",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}
