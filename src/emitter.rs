use crate::macaroon::{Macaroon, Version};
use crate::signer::Signer;
use crate::ByteString;
use crate::Result;

struct DelegatedOp {
    operation: ByteString,
    location: String,
    nonce: ByteString,
}

/// Builder that mints a macaroon authorizing a set of operations.
///
/// First-party caveats are accumulated and signed in one aggregate pass at
/// the end, since the HMAC chain is a left fold. Third-party delegations
/// need more care: the verification id is derived from the tag as it stood
/// *before* the caveat lands, so `emit` re-signs before each delegated
/// append and uses the signer's data side channel to seal the nonce.
///
/// ```rust,no_run
/// # use macaroon_pass::{Emitter, HmacSha256Signer, MacaroonKey};
/// # fn main() -> macaroon_pass::Result<()> {
/// let key = MacaroonKey::generate_random();
/// let mut emitter = Emitter::new(HmacSha256Signer::new(key), "card-id".into());
/// emitter.authorize_operation("payment".into());
/// emitter.delegate_authorization("merchant-4711".into(), "das", "nonce".into());
/// let macaroon = emitter.emit()?;
/// # let _ = macaroon;
/// # Ok(())
/// # }
/// ```
pub struct Emitter<S: Signer> {
    macaroon_base: Option<Macaroon>,
    signer: S,
    selector: ByteString,
    operations: Vec<ByteString>,
    delegated_ops: Vec<DelegatedOp>,
}

impl<S: Signer> Emitter<S> {
    /// An emitter minting a fresh V2 macaroon whose id is `selector`.
    pub fn new(signer: S, selector: ByteString) -> Emitter<S> {
        Emitter {
            macaroon_base: None,
            signer,
            selector,
            operations: Vec::new(),
            delegated_ops: Vec::new(),
        }
    }

    /// An emitter extending an existing macaroon. The signer must be able
    /// to continue its chain (for HMAC, one derived via
    /// [`HmacSha256Signer::for_macaroon`](crate::HmacSha256Signer::for_macaroon)
    /// or holding the root key that produced it).
    pub fn attenuate(signer: S, base: Macaroon) -> Emitter<S> {
        let selector = base.identifier().clone();
        Emitter {
            macaroon_base: Some(base),
            signer,
            selector,
            operations: Vec::new(),
            delegated_ops: Vec::new(),
        }
    }

    /// Queue a first-party caveat authorizing `operation`.
    pub fn authorize_operation(&mut self, operation: ByteString) {
        self.operations.push(operation);
    }

    /// Queue first-party caveats for each of `operations`, in order.
    pub fn authorize_operations<I>(&mut self, operations: I)
    where
        I: IntoIterator<Item = ByteString>,
    {
        self.operations.extend(operations);
    }

    /// Queue a third-party caveat delegating `operation` to the principal
    /// at `location`. The `nonce` is the public half of the key exchange:
    /// the discharger reconstructs its root key from this nonce and the
    /// tag it shares with the issuer.
    pub fn delegate_authorization(
        &mut self,
        operation: ByteString,
        location: &str,
        nonce: ByteString,
    ) {
        self.delegated_ops.push(DelegatedOp {
            operation,
            location: String::from(location),
            nonce,
        });
    }

    /// Build and sign the macaroon. Queued caveats stay queued, but the
    /// signer advances with the emitted chain, so an emitter is in
    /// practice good for one `emit` per signer.
    pub fn emit(&mut self) -> Result<Macaroon> {
        let mut macaroon = match &self.macaroon_base {
            Some(base) => base.clone(),
            None => Macaroon::new(self.selector.clone(), None, Version::V2)?,
        };
        for operation in &self.operations {
            macaroon.append_first_party_caveat(operation.clone())?;
        }
        for delegated in &self.delegated_ops {
            // The tag before this append doubles as the discharge root
            // key, so it has to reflect everything already in the chain.
            self.signer.sign(&mut macaroon)?;
            let verifier_id = self.signer.sign_data(delegated.nonce.as_ref())?;
            macaroon.append_third_party_caveat(
                delegated.operation.clone(),
                verifier_id,
                &delegated.location,
            )?;
        }
        self.signer.sign(&mut macaroon)?;
        Ok(macaroon)
    }
}
