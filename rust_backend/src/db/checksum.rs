//! Checksum calculation for analysis output fingerprints.

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 checksum of serialized output.
///
/// # Arguments
/// * `content` - JSON string content of the analysis output
///
/// # Returns
/// Hexadecimal string representation of the SHA-256 hash.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"peak_hours_summary": []}"#;
        assert_eq!(calculate_checksum(content), calculate_checksum(content));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            calculate_checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
