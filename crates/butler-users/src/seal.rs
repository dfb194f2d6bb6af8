//! AES-256-GCM sealing for access tokens at rest.
//!
//! Blob layout: 12-byte random nonce followed by ciphertext+tag. The key is
//! supplied as 64 hex characters in config and never written to the store.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, UserError};

pub struct TokenSeal {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl TokenSeal {
    /// Build a seal from a 64-hex-char key string.
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| UserError::Seal(format!("key is not valid hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(UserError::Seal(format!(
                "key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, &bytes)
            .map_err(|_| UserError::Seal("failed to build AES key".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Seal a plaintext token into a nonce-prefixed blob.
    pub fn seal(&self, plaintext: &str) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| UserError::Seal("nonce generation failed".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut buf = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut buf)
            .map_err(|_| UserError::Seal("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + buf.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&buf);
        Ok(out)
    }

    /// Unseal a blob produced by [`seal`](Self::seal).
    pub fn open(&self, blob: &[u8]) -> Result<String> {
        if blob.len() <= NONCE_LEN {
            return Err(UserError::Seal("sealed blob too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| UserError::Seal("bad nonce".to_string()))?;

        let mut buf = ciphertext.to_vec();
        let plain = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| UserError::Seal("decryption failed".to_string()))?;
        String::from_utf8(plain.to_vec())
            .map_err(|_| UserError::Seal("token is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn seal_then_open_returns_plaintext() {
        let seal = TokenSeal::from_hex_key(KEY).unwrap();
        let blob = seal.seal("gho_secret_token").unwrap();
        assert_ne!(blob, b"gho_secret_token");
        assert_eq!(seal.open(&blob).unwrap(), "gho_secret_token");
    }

    #[test]
    fn sealing_twice_yields_different_blobs() {
        let seal = TokenSeal::from_hex_key(KEY).unwrap();
        let a = seal.seal("same").unwrap();
        let b = seal.seal("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_blob_fails_to_open() {
        let seal = TokenSeal::from_hex_key(KEY).unwrap();
        let mut blob = seal.seal("token").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(seal.open(&blob).is_err());
    }

    #[test]
    fn rejects_short_or_non_hex_keys() {
        assert!(TokenSeal::from_hex_key("abcd").is_err());
        assert!(TokenSeal::from_hex_key("zz").is_err());
    }
}
