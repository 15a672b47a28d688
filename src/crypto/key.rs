use std::borrow::Borrow;
use std::ops::{Deref, DerefMut};

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const KEY_BYTES: usize = 32usize;

type HmacSha256 = Hmac<Sha256>;

const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// Secret cryptographic key used to sign and verify macaroons, and the
/// output type of the keyed hash the signature chain is built from.
///
/// This is a wrapper around an array of bytes of the correct size for the
/// underlying primitives (32 bytes). Keys can be provided verbatim as raw
/// bytes, generated randomly, or derived from seed material of any length
/// via [`MacaroonKey::generate`]. For security, derive from at least 32
/// bytes of entropy and store the seed securely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacaroonKey(pub [u8; KEY_BYTES]);

impl AsRef<[u8; KEY_BYTES]> for MacaroonKey {
    fn as_ref(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }
}

impl AsRef<[u8]> for MacaroonKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8; KEY_BYTES]> for MacaroonKey {
    fn borrow(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }
}

impl Deref for MacaroonKey {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MacaroonKey {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<[u8; KEY_BYTES]> for MacaroonKey {
    /// Uses bytes directly as a MacaroonKey (with no HMAC)
    fn from(b: [u8; KEY_BYTES]) -> Self {
        MacaroonKey(b)
    }
}

impl From<&[u8; KEY_BYTES]> for MacaroonKey {
    /// Uses bytes directly as a MacaroonKey (with no HMAC)
    fn from(b: &[u8; KEY_BYTES]) -> Self {
        MacaroonKey(*b)
    }
}

impl MacaroonKey {
    /// Generate a new random key from a secure random number generator.
    pub fn generate_random() -> Self {
        let mut rng = rand::thread_rng();
        let mut key: [u8; KEY_BYTES] = [0; KEY_BYTES];
        rng.fill_bytes(&mut key);
        MacaroonKey(key)
    }

    /// Reproducibly derive a key from seed material of any length, using
    /// HMAC-SHA256 under the fixed `macaroons-key-generator` key (the same
    /// constant libmacaroons uses).
    ///
    /// ```rust
    /// # use macaroon_pass::MacaroonKey;
    /// let key = MacaroonKey::generate(b"secret-byte-string");
    /// ```
    pub fn generate(seed: &[u8]) -> Self {
        let mut mac = HmacSha256::new_from_slice(KEY_GENERATOR)
            .expect("HMAC accepts keys of any length");
        mac.update(seed);
        let bytes: [u8; KEY_BYTES] = mac.finalize().into_bytes().into();
        MacaroonKey(bytes)
    }

    /// Constant-time comparison against a candidate tag of any length.
    pub fn ct_eq(&self, other: &[u8]) -> bool {
        self.0.as_slice().ct_eq(other).into()
    }
}

/// HMAC-SHA256 of `data` under `key`; one link of the signature chain.
pub fn hmac<U>(key: &MacaroonKey, data: &U) -> MacaroonKey
where
    U: AsRef<[u8]> + ?Sized,
{
    let mut mac =
        HmacSha256::new_from_slice(key.as_ref()).expect("HMAC accepts keys of any length");
    mac.update(data.as_ref());
    let bytes: [u8; KEY_BYTES] = mac.finalize().into_bytes().into();
    MacaroonKey(bytes)
}

/// `hmac(key, hmac(key, a) || hmac(key, b))`, the binding hash used to tie
/// a discharge signature to its primary.
pub fn hmac2<U, V>(key: &MacaroonKey, a: &U, b: &V) -> MacaroonKey
where
    U: AsRef<[u8]> + ?Sized,
    V: AsRef<[u8]> + ?Sized,
{
    let MacaroonKey(tmp1) = hmac(key, a);
    let MacaroonKey(tmp2) = hmac(key, b);
    let mut data = [0u8; KEY_BYTES * 2];
    data[..KEY_BYTES].copy_from_slice(&tmp1);
    data[KEY_BYTES..].copy_from_slice(&tmp2);
    hmac(key, &data[..])
}
