//! Implementation of macaroon bearer credentials as described in the paper
//! ["Macaroons: Cookies with Contextual Caveats for Decentralized
//! Authorization in the Cloud"](http://theory.stanford.edu/~ataly/Papers/macaroons.pdf),
//! extended with pluggable signing schemes.
//!
//! A macaroon carries an identifier, an ordered chain of caveats and a
//! cryptographic tag binding them. Holders attenuate a macaroon by appending
//! caveats; each append re-keys the tag through a one-way hash chain, so a
//! restricted credential can be produced without talking to the issuer.
//! Third-party caveats delegate a predicate to another principal and are
//! proven by a separate discharge macaroon [bound](macaroon::Macaroon::bind)
//! to the primary.
//!
//! Two signing schemes are provided behind the [`Signer`] trait: an
//! incremental HMAC-SHA256 chain ([`HmacSha256Signer`]) and ECDSA over
//! secp256k1 ([`EcdsaSigner`]). Minting goes through the [`Emitter`]
//! builder; verification walks a primary plus its discharges through a
//! caller-supplied [`Context`].
//!
//! ```rust,no_run
//! use macaroon_pass::{Emitter, HmacSha256Signer, MacaroonKey, Format};
//!
//! # fn main() -> macaroon_pass::Result<()> {
//! let key = MacaroonKey::generate(b"secret");
//! let mut emitter = Emitter::new(HmacSha256Signer::new(key), "card-1234".into());
//! emitter.authorize_operation("payment".into());
//! let macaroon = emitter.emit()?;
//! let wire = macaroon.serialize(Format::V2)?;
//! # let _ = wire;
//! # Ok(())
//! # }
//! ```
//!
//! The crate is a pure in-process component: no transport, no key store, no
//! caveat semantics. The only I/O is the random source injected into
//! verification-id encryption and nonce minting.

#[macro_use]
extern crate log;

pub mod caveat;
pub mod crypto;
pub mod emitter;
pub mod error;
pub mod macaroon;
pub mod serialization;
pub mod signer;
pub mod verifier;

pub use caveat::Caveat;
pub use crypto::key::MacaroonKey;
pub use emitter::Emitter;
pub use error::MacaroonError;
pub use macaroon::{Macaroon, Version};
pub use serialization::Format;
pub use signer::{EcdsaSigner, HmacSha256Signer, Signer};
pub use verifier::{verify, Context};

use std::fmt;

pub type Result<T> = std::result::Result<T, MacaroonError>;

/// An opaque byte string used for macaroon identifiers, caveat ids,
/// verification ids and signatures. V2 macaroons allow arbitrary bytes in
/// all of these; `Debug` renders valid UTF-8 as text and anything else as
/// URL-safe base64.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteString(pub Vec<u8>);

impl ByteString {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ByteString {
    fn from(s: &str) -> ByteString {
        ByteString(s.as_bytes().to_vec())
    }
}

impl From<String> for ByteString {
    fn from(s: String) -> ByteString {
        ByteString(s.into_bytes())
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(v: Vec<u8>) -> ByteString {
        ByteString(v)
    }
}

impl From<&[u8]> for ByteString {
    fn from(v: &[u8]) -> ByteString {
        ByteString(v.to_vec())
    }
}

impl From<MacaroonKey> for ByteString {
    fn from(key: MacaroonKey) -> ByteString {
        ByteString(key.0.to_vec())
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "b64:{}", serialization::base64_encode(&self.0)),
        }
    }
}
