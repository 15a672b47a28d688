use crate::caveat::{Caveat, CaveatBuilder};
use crate::error::MacaroonError;
use crate::macaroon::{Macaroon, Version};
use crate::serialization::macaroon_builder::MacaroonBuilder;
use crate::ByteString;
use crate::Result;
use std::str;

// Version 1 fields
const LOCATION: &str = "location";
const IDENTIFIER: &str = "identifier";
const SIGNATURE: &str = "signature";
const CID: &str = "cid";
const VID: &str = "vid";
const CL: &str = "cl";

const HEADER_SIZE: usize = 4;
const MAX_PACKET_SIZE: usize = 0xffff;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Four lowercase hex digits covering the whole packet, header included.
fn packet_header(size: usize) -> [u8; 4] {
    let mut header = [0u8; 4];
    for (i, byte) in header.iter_mut().enumerate() {
        *byte = HEX_DIGITS[(size >> (12 - 4 * i)) & 0xf];
    }
    header
}

fn serialize_as_packet(tag: &str, value: &[u8]) -> Result<Vec<u8>> {
    let size = HEADER_SIZE + 2 + tag.len() + value.len();
    if size > MAX_PACKET_SIZE {
        return Err(MacaroonError::InvalidArgument("field too long for a V1 packet"));
    }
    let mut packet: Vec<u8> = Vec::with_capacity(size);
    packet.extend_from_slice(&packet_header(size));
    packet.extend_from_slice(tag.as_bytes());
    packet.extend_from_slice(b" ");
    packet.extend_from_slice(value);
    packet.extend_from_slice(b"\n");
    Ok(packet)
}

/// The raw packet form of a single macaroon (no base64 wrapping).
pub fn serialize(macaroon: &Macaroon) -> Result<Vec<u8>> {
    let mut serialized: Vec<u8> = Vec::new();
    if let Some(location) = macaroon.location() {
        serialized.extend(serialize_as_packet(LOCATION, location.as_bytes())?);
    }
    serialized.extend(serialize_as_packet(IDENTIFIER, macaroon.identifier().as_ref())?);
    for c in macaroon.caveats() {
        match c {
            Caveat::FirstParty(fp) => {
                serialized.extend(serialize_as_packet(CID, fp.predicate().as_ref())?);
            }
            Caveat::ThirdParty(tp) => {
                serialized.extend(serialize_as_packet(CID, tp.id().as_ref())?);
                serialized.extend(serialize_as_packet(VID, tp.verifier_id().as_ref())?);
                serialized.extend(serialize_as_packet(CL, tp.location().as_bytes())?);
            }
        }
    }
    serialized.extend(serialize_as_packet(SIGNATURE, macaroon.signature().as_ref())?);
    Ok(serialized)
}

/// A slice of macaroons is the plain concatenation of their packet forms;
/// the signature packet ends each macaroon.
pub fn serialize_slice(macaroons: &[Macaroon]) -> Result<Vec<u8>> {
    let mut serialized: Vec<u8> = Vec::new();
    for macaroon in macaroons {
        serialized.extend(serialize(macaroon)?);
    }
    Ok(serialized)
}

struct Packet {
    key: String,
    value: Vec<u8>,
}

struct V1Parser<'r> {
    data: &'r [u8],
    index: usize,
}

impl<'r> V1Parser<'r> {
    fn new(data: &[u8]) -> V1Parser {
        V1Parser { data, index: 0 }
    }

    fn at_end(&self) -> bool {
        self.index >= self.data.len()
    }

    /// Consume `0000`+newline delimiter packets, tolerated between
    /// macaroons and at the end of the stream.
    fn skip_delimiters(&mut self) {
        while self.data[self.index..].starts_with(b"0000") {
            self.index += HEADER_SIZE;
            if self.data.get(self.index) == Some(&b'\n') {
                self.index += 1;
            }
        }
    }

    fn next_packet(&mut self) -> Result<Packet> {
        if self.index + HEADER_SIZE > self.data.len() {
            return Err(MacaroonError::DeserializationError(String::from(
                "truncated packet header",
            )));
        }
        let hex: &str = str::from_utf8(&self.data[self.index..self.index + HEADER_SIZE])?;
        let size: usize = usize::from_str_radix(hex, 16)?;
        if size < HEADER_SIZE + 2 || self.index + size > self.data.len() {
            return Err(MacaroonError::DeserializationError(String::from(
                "illegal packet length",
            )));
        }
        let packet_data = &self.data[self.index + HEADER_SIZE..self.index + size];
        self.index += size;
        let split = packet_data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| {
                MacaroonError::DeserializationError(String::from("no key/value separator"))
            })?;
        let (key_slice, value_slice) = packet_data.split_at(split);
        if value_slice.last() != Some(&b'\n') {
            return Err(MacaroonError::DeserializationError(String::from(
                "packet missing trailing newline",
            )));
        }
        Ok(Packet {
            key: String::from_utf8(key_slice.to_vec())?,
            // skip the separator space and the terminating newline
            value: value_slice[1..value_slice.len() - 1].to_vec(),
        })
    }

    fn read_macaroon(&mut self) -> Result<Macaroon> {
        let mut builder = MacaroonBuilder::new(Version::V1);
        let mut caveat_builder = CaveatBuilder::new();
        loop {
            let packet = self.next_packet()?;
            match packet.key.as_str() {
                LOCATION => builder.set_location(String::from_utf8(packet.value)?),
                IDENTIFIER => builder.set_identifier(ByteString(packet.value)),
                CID => {
                    if caveat_builder.has_id() {
                        builder.add_caveat(caveat_builder.build()?);
                        caveat_builder = CaveatBuilder::new();
                    }
                    caveat_builder.add_id(ByteString(packet.value));
                }
                VID => caveat_builder.add_verifier_id(ByteString(packet.value)),
                CL => caveat_builder.add_location(String::from_utf8(packet.value)?),
                SIGNATURE => {
                    if caveat_builder.has_id() {
                        builder.add_caveat(caveat_builder.build()?);
                    }
                    builder.set_signature(ByteString(packet.value));
                    return builder.build();
                }
                key => {
                    error!("v1: unknown packet key {:?}", key);
                    return Err(MacaroonError::DeserializationError(String::from(
                        "unknown packet key",
                    )));
                }
            }
        }
    }
}

/// Decode a single macaroon from its raw packet form.
pub fn deserialize(data: &[u8]) -> Result<Macaroon> {
    let mut parser = V1Parser::new(data);
    let macaroon = parser.read_macaroon()?;
    parser.skip_delimiters();
    if !parser.at_end() {
        return Err(MacaroonError::DeserializationError(String::from(
            "trailing data after macaroon",
        )));
    }
    Ok(macaroon)
}

/// Decode a concatenated slice of macaroons from raw packet form.
pub fn deserialize_slice(data: &[u8]) -> Result<Vec<Macaroon>> {
    let mut parser = V1Parser::new(data);
    let mut macaroons = Vec::new();
    parser.skip_delimiters();
    while !parser.at_end() {
        macaroons.push(parser.read_macaroon()?);
        parser.skip_delimiters();
    }
    if macaroons.is_empty() {
        return Err(MacaroonError::DeserializationError(String::from(
            "no macaroons in input",
        )));
    }
    Ok(macaroons)
}
