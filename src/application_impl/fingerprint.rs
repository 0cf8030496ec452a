use crate::application_port::AuthError;
use crate::domain_model::RefreshFingerprint;
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;

/// Derives the server-side fingerprint of a refresh token: hex HMAC-SHA256
/// of its serialized form under a key separate from the signing key.
pub struct RefreshFingerprinter {
    key: Vec<u8>,
}

impl RefreshFingerprinter {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    pub fn fingerprint(&self, refresh_token: &str) -> Result<RefreshFingerprint, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        mac.update(refresh_token.as_bytes());
        let out = mac.finalize().into_bytes();
        Ok(RefreshFingerprint(hex::encode(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_keyed() {
        let a = RefreshFingerprinter::new(b"key-a".to_vec());
        let b = RefreshFingerprinter::new(b"key-b".to_vec());

        let fp = a.fingerprint("token").unwrap();
        assert_eq!(fp, a.fingerprint("token").unwrap());
        assert_eq!(fp.0.len(), 64);
        assert_ne!(fp, a.fingerprint("token2").unwrap());
        assert_ne!(fp, b.fingerprint("token").unwrap());
    }
}
