use crate::caveat::Caveat;
use crate::error::MacaroonError;
use crate::macaroon::{Macaroon, Version};
use crate::ByteString;
use crate::Result;

/// Accumulates macaroon fields as a decoder encounters them. An identifier
/// is mandatory; a signature is not, because a token whose signature was
/// erased before shipping is still decodable (it just cannot verify until
/// one is set again).
pub struct MacaroonBuilder {
    identifier: Option<ByteString>,
    location: Option<String>,
    signature: ByteString,
    caveats: Vec<Caveat>,
    version: Version,
}

impl MacaroonBuilder {
    pub fn new(version: Version) -> MacaroonBuilder {
        MacaroonBuilder {
            identifier: None,
            location: None,
            signature: ByteString::default(),
            caveats: Vec::new(),
            version,
        }
    }

    pub fn set_identifier(&mut self, identifier: ByteString) {
        self.identifier = Some(identifier);
    }

    pub fn set_location(&mut self, location: String) {
        self.location = Some(location);
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn set_signature(&mut self, signature: ByteString) {
        self.signature = signature;
    }

    pub fn add_caveat(&mut self, caveat: Caveat) {
        self.caveats.push(caveat);
    }

    pub fn build(self) -> Result<Macaroon> {
        let identifier = self.identifier.ok_or_else(|| {
            MacaroonError::DeserializationError(String::from("no identifier found"))
        })?;
        let mut macaroon = Macaroon::new(identifier, self.location, self.version)?;
        for caveat in self.caveats {
            macaroon.push_caveat(caveat)?;
        }
        macaroon.set_signature(self.signature);
        Ok(macaroon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caveat;

    #[test]
    fn build_requires_identifier() {
        let builder = MacaroonBuilder::new(Version::V2);
        assert!(builder.build().is_err());
    }

    #[test]
    fn build_allows_missing_signature() {
        let mut builder = MacaroonBuilder::new(Version::V2);
        builder.set_identifier("keyid".into());
        let macaroon = builder.build().unwrap();
        assert!(macaroon.signature().is_empty());
    }

    #[test]
    fn build_enforces_v1_utf8_caveats() {
        let mut builder = MacaroonBuilder::new(Version::V1);
        builder.set_identifier("keyid".into());
        builder.add_caveat(caveat::new_first_party(vec![0xff, 0xfe].into()));
        assert!(builder.build().is_err());
    }
}
