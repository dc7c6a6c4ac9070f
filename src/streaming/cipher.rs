//! Per-store AES-256-GCM sealing of spilled fragments

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::io;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Sealed fragment overhead: nonce and tag
pub(crate) const SEAL_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Cipher holding a key that only ever lives in this process
pub(crate) struct SpillCipher {
    cipher: Aes256Gcm,
}

impl SpillCipher {
    /// Fresh random key from the OS RNG
    pub(crate) fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        key.fill(0);
        SpillCipher { cipher }
    }

    /// Encrypt one fragment. Layout: nonce | tag | ciphertext.
    ///
    /// `sequence` is bound as associated data so fragments cannot be
    /// reordered or dropped without detection.
    pub(crate) fn seal(&self, sequence: u64, plaintext: &[u8]) -> io::Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(nonce, &sequence.to_le_bytes(), &mut buffer)
            .map_err(|_| io::Error::other("failed to encrypt spill fragment"))?;

        let mut out = Vec::with_capacity(SEAL_OVERHEAD + buffer.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(tag.as_slice());
        out.extend_from_slice(&buffer);
        Ok(out)
    }

    pub(crate) fn open(&self, sequence: u64, sealed: &[u8]) -> io::Result<Vec<u8>> {
        if sealed.len() < SEAL_OVERHEAD {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "sealed spill fragment is truncated",
            ));
        }
        let (nonce_bytes, rest) = sealed.split_at(NONCE_LEN);
        let (tag_bytes, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce_bytes),
                &sequence.to_le_bytes(),
                &mut buffer,
                Tag::from_slice(tag_bytes),
            )
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "spill fragment failed authentication",
                )
            })?;
        Ok(buffer)
    }
}

impl fmt::Debug for SpillCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpillCipher").finish_non_exhaustive()
    }
}
