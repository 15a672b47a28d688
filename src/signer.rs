use k256::ecdsa::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::crypto::ecdsa;
use crate::crypto::key::{self, MacaroonKey};
use crate::error::MacaroonError;
use crate::macaroon::{bind_for_request, Macaroon};
use crate::ByteString;
use crate::Result;

/// A signing scheme for macaroons.
///
/// `sign` replaces the macaroon's signature with one covering the id and
/// every caveat; `sign_data` signs an arbitrary byte string as a side
/// channel of the current chain state (used to derive third-party
/// verification ids); `verify` checks a macaroon's signature. A signer
/// never mutates the macaroon when it fails.
pub trait Signer {
    fn sign(&mut self, macaroon: &mut Macaroon) -> Result<()>;
    fn sign_data(&self, data: &[u8]) -> Result<ByteString>;
    fn verify(&self, macaroon: &Macaroon) -> Result<()>;
}

struct ChainPosition {
    tag: MacaroonKey,
    identifier: ByteString,
    next_step: usize,
}

/// The keyed-HMAC chain scheme, with incremental continuation.
///
/// The signature is the left fold of [`Caveat::sign`](crate::Caveat::sign)
/// over the caveat sequence, seeded with `hmac(root_key, id)`. The signer
/// remembers where in the chain it stopped, so the
/// [`Emitter`](crate::Emitter) can interleave signing with third-party
/// appends: each `sign` resumes from the stored tag and only processes the
/// caveats appended since.
///
/// The continuation protocol is strict: a signer derived from (or
/// progressed on) one macaroon refuses any macaroon with a different id,
/// and refuses its own macaroon if the signature was erased or replaced
/// behind its back.
pub struct HmacSha256Signer {
    key: Option<MacaroonKey>,
    position: Option<ChainPosition>,
}

impl HmacSha256Signer {
    /// A fresh signer for minting under `key`.
    pub fn new(key: MacaroonKey) -> HmacSha256Signer {
        HmacSha256Signer {
            key: Some(key),
            position: None,
        }
    }

    /// Continue the chain of an already-signed macaroon, e.g. to attenuate
    /// a received token without knowing its root key.
    pub fn for_macaroon(macaroon: &Macaroon) -> Result<HmacSha256Signer> {
        let sig = macaroon.signature();
        if sig.len() != key::KEY_BYTES {
            return Err(MacaroonError::SignerState(
                "cannot continue the chain of an unsigned macaroon",
            ));
        }
        let mut tag = MacaroonKey::default();
        tag.0.copy_from_slice(sig.as_ref());
        Ok(HmacSha256Signer {
            key: None,
            position: Some(ChainPosition {
                tag,
                identifier: macaroon.identifier().clone(),
                next_step: macaroon.caveats().len() + 1,
            }),
        })
    }

    /// The full chain tag for `macaroon` under `key`, recomputed from
    /// scratch.
    pub fn chain(key: &MacaroonKey, macaroon: &Macaroon) -> MacaroonKey {
        let mut tag = key::hmac(key, macaroon.identifier());
        for caveat in macaroon.caveats() {
            tag = caveat.sign(&tag);
        }
        tag
    }

    /// Verify a (non-discharge) macaroon's signature under `key`,
    /// comparing in constant time.
    pub fn verify_with_key(key: &MacaroonKey, macaroon: &Macaroon) -> Result<()> {
        let computed = Self::chain(key, macaroon);
        if computed.ct_eq(macaroon.signature().as_ref()) {
            Ok(())
        } else {
            Err(MacaroonError::SignatureMismatch)
        }
    }

    /// Recover the discharge root key sealed inside the verification id
    /// of the caveat with id `caveat_id`, by replaying the chain under
    /// `key` up to that caveat. Counterpart of
    /// [`Macaroon::append_sealed_third_party_caveat`](crate::Macaroon::append_sealed_third_party_caveat).
    pub fn recover_discharge_key(
        key: &MacaroonKey,
        macaroon: &Macaroon,
        caveat_id: &ByteString,
    ) -> Result<MacaroonKey> {
        let mut tag = key::hmac(key, macaroon.identifier());
        for caveat in macaroon.caveats() {
            if caveat.id() == caveat_id {
                return match caveat {
                    crate::Caveat::ThirdParty(tp) => {
                        crate::crypto::decrypt(&tag, tp.verifier_id().as_ref())
                    }
                    crate::Caveat::FirstParty(_) => Err(MacaroonError::InvalidArgument(
                        "caveat is not third-party",
                    )),
                };
            }
            tag = caveat.sign(&tag);
        }
        Err(MacaroonError::InvalidArgument("no caveat with that id"))
    }

    /// Verify a discharge macaroon that has been
    /// [bound](crate::Macaroon::bind) to a primary whose signature is
    /// `primary_sig`.
    pub fn verify_discharge(
        key: &MacaroonKey,
        discharge: &Macaroon,
        primary_sig: &ByteString,
    ) -> Result<()> {
        let unbound: ByteString = Self::chain(key, discharge).into();
        let bound = bind_for_request(primary_sig, &unbound);
        if bound.ct_eq(discharge.signature().as_ref()) {
            Ok(())
        } else {
            Err(MacaroonError::SignatureMismatch)
        }
    }
}

impl Signer for HmacSha256Signer {
    fn sign(&mut self, macaroon: &mut Macaroon) -> Result<()> {
        let (start, first_unsigned) = match (&self.position, &self.key) {
            (Some(position), _) => {
                if macaroon.identifier() != &position.identifier {
                    return Err(MacaroonError::SignerState(
                        "signer is bound to a different macaroon",
                    ));
                }
                if macaroon.signature().is_empty() {
                    return Err(MacaroonError::SignerState(
                        "macaroon signature was erased mid-chain",
                    ));
                }
                if !position.tag.ct_eq(macaroon.signature().as_ref()) {
                    return Err(MacaroonError::SignerState(
                        "macaroon signature diverged from the signer's chain",
                    ));
                }
                (position.tag, position.next_step - 1)
            }
            (None, Some(root)) => (key::hmac(root, macaroon.identifier()), 0),
            (None, None) => {
                return Err(MacaroonError::SignerState(
                    "signer has neither a key nor a chain position",
                ))
            }
        };
        let mut tag = start;
        for caveat in &macaroon.caveats()[first_unsigned..] {
            tag = caveat.sign(&tag);
        }
        macaroon.set_signature(tag.into());
        self.position = Some(ChainPosition {
            tag,
            identifier: macaroon.identifier().clone(),
            next_step: macaroon.caveats().len() + 1,
        });
        Ok(())
    }

    /// `hmac(current_tag, data)`. This is the side channel third-party
    /// delegation relies on: a discharger who knows the same tag can
    /// recompute the result from the public nonce.
    fn sign_data(&self, data: &[u8]) -> Result<ByteString> {
        match &self.position {
            Some(position) => Ok(key::hmac(&position.tag, data).into()),
            None => Err(MacaroonError::SignerState(
                "no signature tag established yet",
            )),
        }
    }

    fn verify(&self, macaroon: &Macaroon) -> Result<()> {
        match &self.key {
            Some(root) => Self::verify_with_key(root, macaroon),
            None => Err(MacaroonError::SignerState(
                "verification requires the root key",
            )),
        }
    }
}

impl Drop for HmacSha256Signer {
    fn drop(&mut self) {
        if let Some(key) = &mut self.key {
            key.0.zeroize();
        }
        if let Some(position) = &mut self.position {
            position.tag.0.zeroize();
        }
    }
}

/// The ECDSA-over-secp256k1 scheme. Unlike the HMAC chain this signer is
/// stateless: every `sign` covers the whole token by signing a SHA-256
/// hash of its canonical bytes (the id, then each caveat id, preceded by
/// its verification id for third-party caveats; locations are excluded).
pub struct EcdsaSigner {
    signing_key: Option<SigningKey>,
    verifying_key: VerifyingKey,
}

impl EcdsaSigner {
    /// A signer holding the 32-byte private key; can both sign and verify.
    pub fn new(private_key: &[u8]) -> Result<EcdsaSigner> {
        let signing_key = ecdsa::signing_key(private_key)?;
        let verifying_key = *signing_key.verifying_key();
        Ok(EcdsaSigner {
            signing_key: Some(signing_key),
            verifying_key,
        })
    }

    /// A verify-only signer from a SEC1-encoded public key.
    pub fn from_public_key(public_key: &[u8]) -> Result<EcdsaSigner> {
        Ok(EcdsaSigner {
            signing_key: None,
            verifying_key: ecdsa::verifying_key(public_key)?,
        })
    }

    /// The SEC1 compressed encoding of the verifying key.
    pub fn public_key(&self) -> Vec<u8> {
        self.verifying_key.to_sec1_bytes().to_vec()
    }
}

fn canonical_bytes(macaroon: &Macaroon) -> Vec<u8> {
    let mut msg = macaroon.identifier().as_ref().to_vec();
    for caveat in macaroon.caveats() {
        msg.extend_from_slice(caveat.id().as_ref());
        if let crate::Caveat::ThirdParty(tp) = caveat {
            msg.extend_from_slice(tp.verifier_id().as_ref());
        }
    }
    msg
}

impl Signer for EcdsaSigner {
    fn sign(&mut self, macaroon: &mut Macaroon) -> Result<()> {
        let signing_key = self.signing_key.as_ref().ok_or(MacaroonError::SignerState(
            "signing requires the private key",
        ))?;
        let der = ecdsa::sign(signing_key, &canonical_bytes(macaroon))?;
        macaroon.set_signature(der.into());
        Ok(())
    }

    fn sign_data(&self, data: &[u8]) -> Result<ByteString> {
        let signing_key = self.signing_key.as_ref().ok_or(MacaroonError::SignerState(
            "signing requires the private key",
        ))?;
        ecdsa::sign(signing_key, data).map(ByteString::from)
    }

    fn verify(&self, macaroon: &Macaroon) -> Result<()> {
        if macaroon.signature().is_empty() {
            return Err(MacaroonError::SignatureMismatch);
        }
        ecdsa::verify(
            &self.verifying_key,
            macaroon.signature().as_ref(),
            &canonical_bytes(macaroon),
        )
    }
}
