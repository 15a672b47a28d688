use crate::caveat::{Caveat, CaveatBuilder};
use crate::error::MacaroonError;
use crate::macaroon::{Macaroon, Version};
use crate::serialization::macaroon_builder::MacaroonBuilder;
use crate::ByteString;
use crate::Result;

pub(crate) const VERSION_BYTE: u8 = 2;

// Version 2 field tags
const EOS_V2: u8 = 0;
const LOCATION_V2: u8 = 1;
const IDENTIFIER_V2: u8 = 2;
const VID_V2: u8 = 4;
const SIGNATURE_V2: u8 = 6;

/// Base-128 length prefix, low group first, high bit flagging
/// continuation.
fn put_varint(mut value: usize, buffer: &mut Vec<u8>) {
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buffer.push(group);
            return;
        }
        buffer.push(group | 0x80);
    }
}

fn serialize_field(tag: u8, value: &[u8], buffer: &mut Vec<u8>) {
    buffer.push(tag);
    put_varint(value.len(), buffer);
    buffer.extend_from_slice(value);
}

/// The V2 field-tagged binary form of a single macaroon.
pub fn serialize(macaroon: &Macaroon) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    buffer.push(VERSION_BYTE);
    if let Some(location) = macaroon.location() {
        serialize_field(LOCATION_V2, location.as_bytes(), &mut buffer);
    }
    serialize_field(IDENTIFIER_V2, macaroon.identifier().as_ref(), &mut buffer);
    buffer.push(EOS_V2);
    for caveat in macaroon.caveats() {
        match caveat {
            Caveat::FirstParty(fp) => {
                serialize_field(IDENTIFIER_V2, fp.predicate().as_ref(), &mut buffer);
                buffer.push(EOS_V2);
            }
            Caveat::ThirdParty(tp) => {
                serialize_field(LOCATION_V2, tp.location().as_bytes(), &mut buffer);
                serialize_field(IDENTIFIER_V2, tp.id().as_ref(), &mut buffer);
                serialize_field(VID_V2, tp.verifier_id().as_ref(), &mut buffer);
                buffer.push(EOS_V2);
            }
        }
    }
    buffer.push(EOS_V2);
    serialize_field(SIGNATURE_V2, macaroon.signature().as_ref(), &mut buffer);
    Ok(buffer)
}

/// A V2 slice is the plain concatenation of V2 macaroons; every frame is
/// self-delimiting.
pub fn serialize_slice(macaroons: &[Macaroon]) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    for macaroon in macaroons {
        buffer.extend(serialize(macaroon)?);
    }
    Ok(buffer)
}

struct V2Deserializer<'r> {
    data: &'r [u8],
    index: usize,
}

impl<'r> V2Deserializer<'r> {
    pub fn new(data: &[u8]) -> V2Deserializer {
        V2Deserializer { data, index: 0 }
    }

    fn at_end(&self) -> bool {
        self.index >= self.data.len()
    }

    fn get_byte(&mut self) -> Result<u8> {
        match self.data.get(self.index) {
            Some(&byte) => {
                self.index += 1;
                Ok(byte)
            }
            None => Err(MacaroonError::DeserializationError(String::from(
                "buffer overrun",
            ))),
        }
    }

    pub fn get_tag(&mut self) -> Result<u8> {
        self.get_byte()
    }

    pub fn get_eos(&mut self) -> Result<()> {
        match self.get_byte()? {
            EOS_V2 => Ok(()),
            _ => Err(MacaroonError::DeserializationError(String::from(
                "expected end of section",
            ))),
        }
    }

    pub fn get_field(&mut self) -> Result<Vec<u8>> {
        let size: usize = self.get_field_size()?;
        if size + self.index > self.data.len() {
            return Err(MacaroonError::DeserializationError(String::from(
                "unexpected end of field",
            )));
        }
        let field: Vec<u8> = self.data[self.index..self.index + size].to_vec();
        self.index += size;
        Ok(field)
    }

    fn skip_field(&mut self) -> Result<()> {
        self.get_field().map(|_| ())
    }

    fn get_field_size(&mut self) -> Result<usize> {
        let mut size: usize = 0;
        let mut shift: usize = 0;
        while shift <= 63 {
            let byte = self.get_byte()?;
            size |= ((byte & 127) as usize) << shift;
            if byte & 128 == 0 {
                return Ok(size);
            }
            shift += 7;
        }
        Err(MacaroonError::DeserializationError(String::from(
            "varint field size overflow",
        )))
    }

    fn read_macaroon(&mut self) -> Result<Macaroon> {
        if self.get_byte()? != VERSION_BYTE {
            return Err(MacaroonError::DeserializationError(String::from(
                "wrong version byte",
            )));
        }
        let mut builder = MacaroonBuilder::new(Version::V2);
        let mut tag: u8 = self.get_tag()?;
        if tag == LOCATION_V2 {
            builder.set_location(String::from_utf8(self.get_field()?)?);
            tag = self.get_tag()?;
        }
        if tag == IDENTIFIER_V2 {
            builder.set_identifier(ByteString(self.get_field()?));
        } else {
            return Err(MacaroonError::DeserializationError(String::from(
                "identifier not found",
            )));
        }
        self.get_eos()?;

        loop {
            let mut tag = self.get_tag()?;
            if tag == EOS_V2 {
                break;
            }
            let mut caveat_builder = CaveatBuilder::new();
            loop {
                match tag {
                    LOCATION_V2 => {
                        caveat_builder.add_location(String::from_utf8(self.get_field()?)?)
                    }
                    IDENTIFIER_V2 => caveat_builder.add_id(ByteString(self.get_field()?)),
                    VID_V2 => caveat_builder.add_verifier_id(ByteString(self.get_field()?)),
                    SIGNATURE_V2 => {
                        return Err(MacaroonError::DeserializationError(String::from(
                            "signature field inside caveat",
                        )))
                    }
                    unknown => {
                        // Forward compatibility: optional fields inside a
                        // caveat section are skipped, not rejected.
                        debug!("v2: skipping unknown caveat field tag {}", unknown);
                        self.skip_field()?;
                    }
                }
                tag = self.get_tag()?;
                if tag == EOS_V2 {
                    break;
                }
            }
            builder.add_caveat(caveat_builder.build()?);
        }

        if self.get_tag()? != SIGNATURE_V2 {
            return Err(MacaroonError::DeserializationError(String::from(
                "signature not found",
            )));
        }
        builder.set_signature(ByteString(self.get_field()?));
        builder.build()
    }
}

/// Decode a single V2 macaroon; trailing bytes are an error.
pub fn deserialize(data: &[u8]) -> Result<Macaroon> {
    let mut deserializer = V2Deserializer::new(data);
    let macaroon = deserializer.read_macaroon()?;
    if !deserializer.at_end() {
        return Err(MacaroonError::DeserializationError(String::from(
            "trailing data after macaroon",
        )));
    }
    Ok(macaroon)
}

/// Decode a concatenated slice of V2 macaroons.
pub fn deserialize_slice(data: &[u8]) -> Result<Vec<Macaroon>> {
    let mut deserializer = V2Deserializer::new(data);
    let mut macaroons = Vec::new();
    while !deserializer.at_end() {
        macaroons.push(deserializer.read_macaroon()?);
    }
    if macaroons.is_empty() {
        return Err(MacaroonError::DeserializationError(String::from(
            "no macaroons in input",
        )));
    }
    Ok(macaroons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::base64_decode;
    use crate::MacaroonKey;

    const SERIALIZED: &str = "AgETaHR0cDovL2V4YW1wbGUub3JnLwIFa2V5aWQAAhRhY2NvdW50ID0gMzczNTkyODU1OQACDHVzZXIgPSBhbGljZQAABiBL6WfNHqDGsmuvakqU7psFsViG2guoXoxCqTyNDhJe_A==";
    const SIGNATURE: [u8; 32] = [
        75, 233, 103, 205, 30, 160, 198, 178, 107, 175, 106, 74, 148, 238, 155, 5, 177, 88, 134,
        218, 11, 168, 94, 140, 66, 169, 60, 141, 14, 18, 94, 252,
    ];

    #[test]
    fn deserialize_known_vector() {
        let data = base64_decode(SERIALIZED.as_bytes()).unwrap();
        let macaroon = deserialize(&data).unwrap();
        assert_eq!(macaroon.location(), Some("http://example.org/"));
        assert_eq!(macaroon.identifier(), &"keyid".into());
        assert_eq!(macaroon.caveats().len(), 2);
        assert_eq!(macaroon.caveats()[0].id(), &"account = 3735928559".into());
        assert_eq!(macaroon.caveats()[1].id(), &"user = alice".into());
        assert_eq!(macaroon.signature(), &ByteString(SIGNATURE.to_vec()));
    }

    #[test]
    fn serialize_known_vector() {
        let mut macaroon = Macaroon::new(
            "keyid".into(),
            Some("http://example.org/".into()),
            Version::V2,
        )
        .unwrap();
        macaroon
            .append_first_party_caveat("account = 3735928559".into())
            .unwrap();
        macaroon.append_first_party_caveat("user = alice".into()).unwrap();
        macaroon.set_signature(ByteString(SIGNATURE.to_vec()));
        let serialized = serialize(&macaroon).unwrap();
        assert_eq!(serialized, base64_decode(SERIALIZED.as_bytes()).unwrap());
    }

    #[test]
    fn round_trip_with_third_party_caveat() {
        let mut macaroon = Macaroon::new(
            ByteString(vec![0x00, 0xc0, 0xff, 0xee]),
            Some("http://example.org/".into()),
            Version::V2,
        )
        .unwrap();
        macaroon
            .append_first_party_caveat("account = 3735928559".into())
            .unwrap();
        macaroon
            .append_third_party_caveat(
                "caveat".into(),
                MacaroonKey::generate(b"caveat key").into(),
                "https://auth.mybank.com",
            )
            .unwrap();
        macaroon.set_signature(ByteString(vec![9u8; 32]));
        let decoded = deserialize(&serialize(&macaroon).unwrap()).unwrap();
        assert_eq!(macaroon, decoded);
    }

    #[test]
    fn round_trip_erased_signature() {
        let macaroon = Macaroon::new("keyid".into(), None, Version::V2).unwrap();
        let decoded = deserialize(&serialize(&macaroon).unwrap()).unwrap();
        assert!(decoded.signature().is_empty());
        assert_eq!(macaroon, decoded);
    }

    #[test]
    fn slice_concatenation_round_trips() {
        let mut m1 = Macaroon::new("some id".into(), Some("a location".into()), Version::V2).unwrap();
        m1.append_first_party_caveat("a caveat".into()).unwrap();
        m1.set_signature(ByteString(vec![1u8; 32]));
        let mut m2 = Macaroon::new("some other id".into(), None, Version::V2).unwrap();
        m2.set_signature(ByteString(vec![2u8; 32]));

        let serialized = serialize_slice(&[m1.clone(), m2.clone()]).unwrap();
        let decoded = deserialize_slice(&serialized).unwrap();
        assert_eq!(decoded, vec![m1, m2]);
    }

    #[test]
    fn unknown_caveat_field_is_skipped() {
        // A caveat carrying an extra (tag 5) field before its id.
        let mut data: Vec<u8> = vec![VERSION_BYTE];
        serialize_field(IDENTIFIER_V2, b"keyid", &mut data);
        data.push(EOS_V2);
        data.push(5);
        put_varint(3, &mut data);
        data.extend_from_slice(b"xyz");
        serialize_field(IDENTIFIER_V2, b"a caveat", &mut data);
        data.push(EOS_V2);
        data.push(EOS_V2);
        serialize_field(SIGNATURE_V2, &[0u8; 32], &mut data);

        let macaroon = deserialize(&data).unwrap();
        assert_eq!(macaroon.caveats().len(), 1);
        assert_eq!(macaroon.caveats()[0].id(), &"a caveat".into());
    }

    #[test]
    fn unknown_top_level_tag_is_rejected() {
        let mut data: Vec<u8> = vec![VERSION_BYTE];
        data.push(5);
        put_varint(3, &mut data);
        data.extend_from_slice(b"xyz");
        assert!(deserialize(&data).is_err());
    }

    #[test]
    fn wrong_version_byte_is_rejected() {
        assert!(deserialize(&[3, 2, 5, b'k', b'e', b'y', b'i', b'd', 0, 0, 6, 0]).is_err());
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let mut macaroon = Macaroon::new("keyid".into(), None, Version::V2).unwrap();
        macaroon.set_signature(ByteString(vec![1u8; 32]));
        let data = serialize(&macaroon).unwrap();
        for cut in 1..data.len() {
            assert!(deserialize(&data[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn multi_byte_varint_lengths_round_trip() {
        let big_caveat = "x".repeat(300);
        let mut macaroon = Macaroon::new("keyid".into(), None, Version::V2).unwrap();
        macaroon.append_first_party_caveat(big_caveat.as_str().into()).unwrap();
        macaroon.set_signature(ByteString(vec![1u8; 32]));
        let decoded = deserialize(&serialize(&macaroon).unwrap()).unwrap();
        assert_eq!(macaroon, decoded);
    }
}
