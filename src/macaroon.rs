use rand::RngCore;

use crate::caveat::{self, Caveat};
use crate::crypto::{self, key, key::MacaroonKey};
use crate::error::MacaroonError;
use crate::serialization::{self, Format};
use crate::signer::Signer;
use crate::ByteString;
use crate::Result;

/// Wire-format generation of a macaroon. V1 requires the macaroon id and
/// every caveat id to be valid UTF-8; V2 allows arbitrary bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    V1,
    V2,
}

/// A macaroon: an identifier, an ordered chain of caveats, and the
/// signature tag that binds them.
///
/// Macaroons are mutable values. None of the mutators recompute the
/// signature; signing is a separate, explicit step through a
/// [`Signer`](crate::Signer). Use `clone()` before sharing: the clone owns
/// its caveat storage, so appends on one copy can never alias into
/// another.
#[derive(Clone, Debug, PartialEq)]
pub struct Macaroon {
    identifier: ByteString,
    location: Option<String>,
    caveats: Vec<Caveat>,
    signature: ByteString,
    version: Version,
}

impl Macaroon {
    /// Create an unsigned macaroon with no caveats. For a V1 macaroon the
    /// id must be valid UTF-8.
    pub fn new(id: ByteString, location: Option<String>, version: Version) -> Result<Macaroon> {
        if version < Version::V2 && std::str::from_utf8(id.as_ref()).is_err() {
            return Err(MacaroonError::InvalidArgument("non-UTF-8 id in V1 macaroon"));
        }
        Ok(Macaroon {
            identifier: id,
            location,
            caveats: Vec::new(),
            signature: ByteString::default(),
            version,
        })
    }

    pub fn identifier(&self) -> &ByteString {
        &self.identifier
    }

    /// The location hint. Not covered by the signature; trust it
    /// accordingly.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    /// The current signature: empty until signed (or after
    /// [`erase_signature`](Self::erase_signature)), a 32-byte HMAC tag or
    /// a DER-encoded ECDSA signature afterwards.
    pub fn signature(&self) -> &ByteString {
        &self.signature
    }

    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// The first caveat whose id equals `id`, if any.
    pub fn get_caveat_by_id(&self, id: &ByteString) -> Option<&Caveat> {
        self.caveats.iter().find(|c| c.id() == id)
    }

    /// Append a first-party caveat. The signature is not updated.
    pub fn append_first_party_caveat(&mut self, predicate: ByteString) -> Result<()> {
        self.check_caveat_id(&predicate)?;
        self.caveats.push(caveat::new_first_party(predicate));
        Ok(())
    }

    /// Append a third-party caveat. The signature is not updated. An empty
    /// verification id is canonicalized to a first-party caveat so that no
    /// zero-length `vid` field ever reaches a marshaller.
    pub fn append_third_party_caveat(
        &mut self,
        id: ByteString,
        verifier_id: ByteString,
        location: &str,
    ) -> Result<()> {
        self.check_caveat_id(&id)?;
        if verifier_id.is_empty() {
            self.caveats.push(caveat::new_first_party(id));
        } else {
            self.caveats
                .push(caveat::new_third_party(id, verifier_id, location));
        }
        Ok(())
    }

    /// Append a third-party caveat whose verification id carries
    /// `discharge_key` sealed (XSalsa20-Poly1305) under the current
    /// signature tag. A verifier replaying the chain to this point can
    /// recover the key with
    /// [`HmacSha256Signer::recover_discharge_key`](crate::HmacSha256Signer::recover_discharge_key);
    /// nobody else can open it. The macaroon must carry a 32-byte HMAC tag
    /// covering everything before this caveat, so sign first.
    pub fn append_sealed_third_party_caveat(
        &mut self,
        id: ByteString,
        discharge_key: &MacaroonKey,
        location: &str,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        if self.signature.len() != key::KEY_BYTES {
            return Err(MacaroonError::SignerState(
                "sealing requires a 32-byte signature tag",
            ));
        }
        let mut tag = MacaroonKey::default();
        tag.0.copy_from_slice(self.signature.as_ref());
        let vid = crypto::encrypt(&tag, discharge_key, rng)?;
        self.append_third_party_caveat(id, ByteString(vid), location)
    }

    /// Append an already-built caveat coming off the wire, enforcing the
    /// same V1 UTF-8 rule as the public mutators.
    pub(crate) fn push_caveat(&mut self, caveat: Caveat) -> Result<()> {
        self.check_caveat_id(caveat.id())?;
        self.caveats.push(caveat);
        Ok(())
    }

    fn check_caveat_id(&self, id: &ByteString) -> Result<()> {
        if self.version < Version::V2 && std::str::from_utf8(id.as_ref()).is_err() {
            return Err(MacaroonError::InvalidArgument(
                "non-UTF-8 caveat id in V1 macaroon",
            ));
        }
        Ok(())
    }

    /// Recompute the signature with the given signer. The scheme decides
    /// what gets signed; see [`HmacSha256Signer`](crate::HmacSha256Signer)
    /// and [`EcdsaSigner`](crate::EcdsaSigner).
    pub fn sign(&mut self, signer: &mut dyn Signer) -> Result<()> {
        signer.sign(self)
    }

    /// Prepare this macaroon for use as a discharge of a primary whose
    /// signature is `primary_sig`: the signature becomes
    /// `hmac2(0, primary_sig, sig)`, so the discharge cannot be replayed
    /// against a different primary. Binding an already-bound (equal)
    /// signature is a no-op.
    pub fn bind(&mut self, primary_sig: &ByteString) {
        if self.signature == *primary_sig {
            return;
        }
        self.signature = bind_for_request(primary_sig, &self.signature).into();
    }

    pub fn set_signature(&mut self, signature: ByteString) {
        self.signature = signature;
    }

    pub fn erase_signature(&mut self) {
        self.signature = ByteString::default();
    }

    /// Serialize in the given format. `V1` yields the packet form wrapped
    /// in URL-safe unpadded base64 (the historical interchange form), `V2`
    /// the raw field-tagged binary, `V2JSON` the JSON object form.
    pub fn serialize(&self, format: Format) -> Result<Vec<u8>> {
        serialization::serialize(self, format)
    }

    /// Deserialize any supported encoding, sniffing the format from the
    /// leading byte.
    pub fn deserialize(data: &[u8]) -> Result<Macaroon> {
        serialization::deserialize(data)
    }
}

const ZERO_KEY: MacaroonKey = MacaroonKey([0; 32]);

/// The binding hash tying a discharge signature to its primary's.
pub(crate) fn bind_for_request(primary_sig: &ByteString, discharge_sig: &ByteString) -> MacaroonKey {
    key::hmac2(&ZERO_KEY, primary_sig, discharge_sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::HmacSha256Signer;

    #[test]
    fn new_macaroon_is_unsigned() {
        let m = Macaroon::new("identifier".into(), Some("location".into()), Version::V2).unwrap();
        assert_eq!(m.identifier(), &"identifier".into());
        assert_eq!(m.location(), Some("location"));
        assert!(m.signature().is_empty());
        assert!(m.caveats().is_empty());
    }

    #[test]
    fn v1_rejects_non_utf8_ids() {
        let raw: ByteString = vec![0xff, 0xfe].into();
        assert!(matches!(
            Macaroon::new(raw.clone(), None, Version::V1),
            Err(MacaroonError::InvalidArgument(_))
        ));
        assert!(Macaroon::new(raw.clone(), None, Version::V2).is_ok());

        let mut m = Macaroon::new("id".into(), None, Version::V1).unwrap();
        assert!(m.append_first_party_caveat(raw).is_err());
    }

    #[test]
    fn appending_does_not_resign() {
        let key = MacaroonKey::generate(b"secret");
        let mut m = Macaroon::new("id".into(), None, Version::V2).unwrap();
        m.sign(&mut HmacSha256Signer::new(key)).unwrap();
        let signed = m.signature().clone();
        m.append_first_party_caveat("a caveat".into()).unwrap();
        assert_eq!(m.signature(), &signed);
    }

    #[test]
    fn empty_vid_degrades_to_first_party() {
        let mut m = Macaroon::new("id".into(), None, Version::V2).unwrap();
        m.append_third_party_caveat("cond".into(), ByteString::default(), "https://auth")
            .unwrap();
        assert!(!m.caveats()[0].is_third_party());
    }

    #[test]
    fn sealing_requires_a_signed_macaroon() {
        let mut m = Macaroon::new("id".into(), None, Version::V2).unwrap();
        let discharge_key = MacaroonKey::generate(b"discharge key");
        assert!(matches!(
            m.append_sealed_third_party_caveat(
                "delegated".into(),
                &discharge_key,
                "das",
                &mut rand::thread_rng()
            ),
            Err(MacaroonError::SignerState(_))
        ));
    }

    #[test]
    fn bind_is_idempotent_on_equal_tags() {
        let key = MacaroonKey::generate(b"secret");
        let mut primary = Macaroon::new("id".into(), None, Version::V2).unwrap();
        primary.sign(&mut HmacSha256Signer::new(key)).unwrap();

        let mut discharge = primary.clone();
        discharge.bind(&primary.signature().clone());
        // Equal tags: binding must not change the signature.
        assert_eq!(discharge.signature(), primary.signature());

        let mut other = Macaroon::new("other".into(), None, Version::V2).unwrap();
        other.sign(&mut HmacSha256Signer::new(key)).unwrap();
        let unbound = other.signature().clone();
        other.bind(&primary.signature().clone());
        assert_ne!(other.signature(), &unbound);
    }

    #[test]
    fn clones_do_not_alias_caveats() {
        let mut original = Macaroon::new("id".into(), None, Version::V2).unwrap();
        original.append_first_party_caveat("one".into()).unwrap();
        let snapshot = original.clone();
        for _ in 0..10 {
            original.append_first_party_caveat("more".into()).unwrap();
        }
        assert_eq!(snapshot.caveats().len(), 1);
    }

    #[test]
    fn caveat_lookup_by_id() {
        let mut m = Macaroon::new("id".into(), None, Version::V2).unwrap();
        m.append_first_party_caveat("payment".into()).unwrap();
        m.append_first_party_caveat("read".into()).unwrap();
        assert!(m.get_caveat_by_id(&"read".into()).is_some());
        assert!(m.get_caveat_by_id(&"write".into()).is_none());
    }
}
