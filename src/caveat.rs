use crate::crypto::key::{self, MacaroonKey};
use crate::error::MacaroonError;
use crate::ByteString;
use crate::Result;

/// A single attenuation of a macaroon.
///
/// A first-party caveat carries the condition the verifier must check; a
/// third-party caveat carries an opaque id the third party uses to locate
/// the root key it issued, plus the verification id that seals that key to
/// this macaroon's tag. A zero-length verification id cannot be
/// represented: builders degrade it to a first-party caveat, so marshallers
/// never emit a spurious empty `vid` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caveat {
    FirstParty(FirstParty),
    ThirdParty(ThirdParty),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirstParty {
    predicate: ByteString,
}

impl FirstParty {
    pub fn predicate(&self) -> &ByteString {
        &self.predicate
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThirdParty {
    id: ByteString,
    verifier_id: ByteString,
    location: String,
}

impl ThirdParty {
    pub fn id(&self) -> &ByteString {
        &self.id
    }
    pub fn verifier_id(&self) -> &ByteString {
        &self.verifier_id
    }
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Caveat {
    /// The caveat id: the condition for a first-party caveat, the opaque
    /// third-party identifier otherwise.
    pub fn id(&self) -> &ByteString {
        match self {
            Caveat::FirstParty(fp) => &fp.predicate,
            Caveat::ThirdParty(tp) => &tp.id,
        }
    }

    pub fn is_third_party(&self) -> bool {
        matches!(self, Caveat::ThirdParty(_))
    }

    /// One step of the HMAC signature chain: `hmac(tag, cid)` for a
    /// first-party caveat, `hmac(tag, vid || cid)` for a third-party one.
    pub fn sign(&self, tag: &MacaroonKey) -> MacaroonKey {
        match self {
            Caveat::FirstParty(fp) => key::hmac(tag, &fp.predicate),
            Caveat::ThirdParty(tp) => {
                let mut data =
                    Vec::with_capacity(tp.verifier_id.len() + tp.id.len());
                data.extend_from_slice(tp.verifier_id.as_ref());
                data.extend_from_slice(tp.id.as_ref());
                key::hmac(tag, &data)
            }
        }
    }
}

pub fn new_first_party(predicate: ByteString) -> Caveat {
    Caveat::FirstParty(FirstParty { predicate })
}

pub fn new_third_party(id: ByteString, verifier_id: ByteString, location: &str) -> Caveat {
    Caveat::ThirdParty(ThirdParty {
        id,
        verifier_id,
        location: String::from(location),
    })
}

/// Accumulates caveat fields as a decoder encounters them.
#[derive(Default)]
pub struct CaveatBuilder {
    id: Option<ByteString>,
    verifier_id: Option<ByteString>,
    location: Option<String>,
}

impl CaveatBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_id(&mut self, id: ByteString) {
        self.id = Some(id);
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn add_verifier_id(&mut self, vid: ByteString) {
        if !vid.is_empty() {
            self.verifier_id = Some(vid);
        }
    }

    pub fn add_location(&mut self, location: String) {
        self.location = Some(location);
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn build(self) -> Result<Caveat> {
        match (self.id, self.verifier_id, self.location) {
            (None, _, _) => Err(MacaroonError::DeserializationError(String::from(
                "no caveat id found",
            ))),
            (Some(id), None, None) => Ok(new_first_party(id)),
            (Some(id), Some(vid), Some(location)) => {
                Ok(new_third_party(id, vid, &location))
            }
            (Some(_), None, Some(_)) => Err(MacaroonError::DeserializationError(
                String::from("caveat location but no verifier id found"),
            )),
            (Some(_), Some(_), None) => Err(MacaroonError::DeserializationError(
                String::from("caveat verifier id but no location found"),
            )),
        }
    }
}
