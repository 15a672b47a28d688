//! Thin wrappers around secp256k1 ECDSA: sign a SHA-256 digest, serialize
//! the signature as DER, verify against a SEC1-encoded public key.

use k256::ecdsa::signature::{DigestSigner, DigestVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::MacaroonError;
use crate::Result;

/// Parse a 32-byte secp256k1 private key.
pub fn signing_key(private: &[u8]) -> Result<SigningKey> {
    SigningKey::from_slice(private)
        .map_err(|_| MacaroonError::InvalidArgument("invalid secp256k1 private key"))
}

/// Parse a SEC1-encoded (compressed or uncompressed) secp256k1 public key.
pub fn verifying_key(public: &[u8]) -> Result<VerifyingKey> {
    VerifyingKey::from_sec1_bytes(public)
        .map_err(|_| MacaroonError::InvalidArgument("invalid secp256k1 public key"))
}

/// DER-encoded ECDSA signature over a single SHA-256 of `msg`.
pub fn sign(key: &SigningKey, msg: &[u8]) -> Result<Vec<u8>> {
    let digest = Sha256::new_with_prefix(msg);
    let signature: Signature = key
        .try_sign_digest(digest)
        .map_err(|_| MacaroonError::SignerState("ecdsa signing failed"))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Check a DER-encoded ECDSA signature over a single SHA-256 of `msg`.
pub fn verify(key: &VerifyingKey, sig: &[u8], msg: &[u8]) -> Result<()> {
    let signature =
        Signature::from_der(sig).map_err(|_| MacaroonError::SignatureMismatch)?;
    let digest = Sha256::new_with_prefix(msg);
    key.verify_digest(digest, &signature)
        .map_err(|_| MacaroonError::SignatureMismatch)
}
