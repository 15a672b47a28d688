use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use rand::RngCore;

use crate::crypto::key::{MacaroonKey, KEY_BYTES};
use crate::error::MacaroonError;
use crate::Result;

pub mod ecdsa;
pub mod key;

pub const NONCE_BYTES: usize = 24usize;
pub const TAG_BYTES: usize = 16usize;

fn new_nonce(rng: &mut dyn RngCore) -> Result<[u8; NONCE_BYTES]> {
    let mut nonce = [0u8; NONCE_BYTES];
    rng.try_fill_bytes(&mut nonce)?;
    Ok(nonce)
}

/// Seal a 32-byte key (typically the discharge root key) under `key` with
/// XSalsa20-Poly1305, producing `nonce || ciphertext`. The nonce comes from
/// the injected random source; this crate never reads a process-global RNG.
pub fn encrypt(key: &MacaroonKey, plain: &MacaroonKey, rng: &mut dyn RngCore) -> Result<Vec<u8>> {
    let nonce = new_nonce(rng)?;
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_ref()));
    let plain_bytes: &[u8] = plain.as_ref();
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plain_bytes)
        .map_err(|_| MacaroonError::DecryptFailure)?;
    let mut out = Vec::with_capacity(NONCE_BYTES + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open `nonce || ciphertext` produced by [`encrypt`]. The plaintext must
/// be exactly one key wide.
pub fn decrypt(key: &MacaroonKey, ciphertext: &[u8]) -> Result<MacaroonKey> {
    if ciphertext.len() < NONCE_BYTES + TAG_BYTES {
        return Err(MacaroonError::ShortCiphertext);
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_BYTES);
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_ref()));
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| MacaroonError::DecryptFailure)?;
    if plain.len() != KEY_BYTES {
        debug!("decrypt: unsealed {} bytes, expected {}", plain.len(), KEY_BYTES);
        return Err(MacaroonError::DecryptFailure);
    }
    let mut bytes = [0u8; KEY_BYTES];
    bytes.copy_from_slice(&plain);
    Ok(MacaroonKey(bytes))
}

#[cfg(test)]
pub(crate) mod test_rng {
    use rand::{CryptoRng, Error, RngCore};

    /// A random source that always fails, for exercising RandomFailure
    /// paths.
    pub struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {}

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), Error> {
            Err(Error::new("synthetic rng failure"))
        }
    }

    impl CryptoRng for FailingRng {}
}
