use rand::RngCore;

/// Number of random bytes in a generated machine secret.
pub const SECRET_BYTES: usize = 32;

/// Cryptographically random, hex-encoded machine secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether a registration response body reports an existing identity.
pub fn is_already_registered(body: &str) -> bool {
    body.contains("already exist")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hex_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), SECRET_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn detects_existing_identity_message() {
        assert!(is_already_registered(r#"{"message":"user already exist"}"#));
        assert!(!is_already_registered(r#"{"message":"invalid token"}"#));
    }
}
