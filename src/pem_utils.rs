use crate::error::{CaError, Result};

/// Returns the label of the first PEM block in `pem_str` (e.g. `CERTIFICATE`).
pub fn pem_label(pem_str: &str) -> Result<String> {
    let pem = pem::parse(pem_str).map_err(|e| CaError::DecodingError(e.to_string()))?;
    Ok(pem.tag().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(label: &str) -> String {
        pem::encode(&pem::Pem::new(label, vec![0x30, 0x00]))
    }

    #[test]
    fn label_of_encoded_block() {
        assert_eq!(pem_label(&encoded("RSA PRIVATE KEY")).unwrap(), "RSA PRIVATE KEY");
    }

    #[test]
    fn truncated_block_is_rejected() {
        let pem = encoded("CERTIFICATE");
        let truncated = &pem[..pem.len() / 2];
        assert!(pem_label(truncated).is_err());
    }
}
