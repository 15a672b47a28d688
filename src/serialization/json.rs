use serde::{Deserialize, Serialize};

use crate::caveat::{Caveat, CaveatBuilder};
use crate::error::MacaroonError;
use crate::macaroon::{Macaroon, Version};
use crate::serialization::macaroon_builder::MacaroonBuilder;
use crate::serialization::{base64_decode, base64_encode};
use crate::ByteString;
use crate::Result;

#[derive(Debug, Default, Deserialize, Serialize)]
struct CaveatV1 {
    cid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cl: Option<String>,
}

/// The V1 JSON object form: plain-text fields, base64 verification ids,
/// hex signature.
#[derive(Debug, Default, Deserialize, Serialize)]
struct SerializationV1 {
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    identifier: String,
    caveats: Vec<CaveatV1>,
    signature: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CaveatV2 {
    #[serde(skip_serializing_if = "Option::is_none")]
    i: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    i64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    l: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    v: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    v64: Option<String>,
}

/// The V2 JSON object form: single-letter fields, with `_64`-suffixed
/// base64 variants for byte fields that are not valid UTF-8.
#[derive(Debug, Default, Deserialize, Serialize)]
struct SerializationV2 {
    v: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    l: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    i: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    i64: Option<String>,
    c: Vec<CaveatV2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s64: Option<String>,
}

impl SerializationV1 {
    fn from_macaroon(macaroon: &Macaroon) -> Result<SerializationV1> {
        let mut serialized = SerializationV1 {
            location: macaroon.location().map(String::from),
            identifier: String::from_utf8(macaroon.identifier().as_ref().to_vec())?,
            caveats: Vec::new(),
            signature: hex::encode(macaroon.signature()),
        };
        for caveat in macaroon.caveats() {
            serialized.caveats.push(match caveat {
                Caveat::FirstParty(fp) => CaveatV1 {
                    cid: String::from_utf8(fp.predicate().as_ref().to_vec())?,
                    vid: None,
                    cl: None,
                },
                Caveat::ThirdParty(tp) => CaveatV1 {
                    cid: String::from_utf8(tp.id().as_ref().to_vec())?,
                    vid: Some(base64_encode(tp.verifier_id().as_ref())),
                    cl: Some(String::from(tp.location())),
                },
            });
        }
        Ok(serialized)
    }

    fn into_macaroon(self) -> Result<Macaroon> {
        let mut builder = MacaroonBuilder::new(Version::V1);
        builder.set_identifier(self.identifier.into());
        if let Some(location) = self.location {
            builder.set_location(location);
        }
        builder.set_signature(ByteString(hex::decode(self.signature)?));
        for caveat in self.caveats {
            let mut caveat_builder = CaveatBuilder::new();
            caveat_builder.add_id(caveat.cid.into());
            if let Some(vid) = caveat.vid {
                caveat_builder.add_verifier_id(ByteString(base64_decode(vid.as_bytes())?));
            }
            if let Some(cl) = caveat.cl {
                caveat_builder.add_location(cl);
            }
            builder.add_caveat(caveat_builder.build()?);
        }
        builder.build()
    }
}

fn plain_or_b64(bytes: &ByteString) -> (Option<String>, Option<String>) {
    match std::str::from_utf8(bytes.as_ref()) {
        Ok(text) => (Some(String::from(text)), None),
        Err(_) => (None, Some(base64_encode(bytes.as_ref()))),
    }
}

/// Decode a field that may appear in plain (`i`) or base64 (`i64`) form.
/// Both at once is an encoding error.
fn merge_field(
    plain: Option<String>,
    encoded: Option<String>,
    what: &str,
) -> Result<Option<ByteString>> {
    match (plain, encoded) {
        (Some(_), Some(_)) => Err(MacaroonError::DeserializationError(format!(
            "found both plain and base64 {} fields",
            what
        ))),
        (Some(text), None) => Ok(Some(text.into())),
        (None, Some(b64)) => Ok(Some(ByteString(base64_decode(b64.as_bytes())?))),
        (None, None) => Ok(None),
    }
}

impl SerializationV2 {
    fn from_macaroon(macaroon: &Macaroon) -> SerializationV2 {
        let (i, i64) = plain_or_b64(macaroon.identifier());
        let mut serialized = SerializationV2 {
            v: 2,
            l: macaroon.location().map(String::from),
            i,
            i64,
            c: Vec::new(),
            s: None,
            s64: Some(base64_encode(macaroon.signature().as_ref())),
        };
        for caveat in macaroon.caveats() {
            serialized.c.push(match caveat {
                Caveat::FirstParty(fp) => {
                    let (i, i64) = plain_or_b64(fp.predicate());
                    CaveatV2 {
                        i,
                        i64,
                        ..Default::default()
                    }
                }
                Caveat::ThirdParty(tp) => {
                    let (i, i64) = plain_or_b64(tp.id());
                    CaveatV2 {
                        i,
                        i64,
                        l: Some(String::from(tp.location())),
                        v: None,
                        v64: Some(base64_encode(tp.verifier_id().as_ref())),
                    }
                }
            });
        }
        serialized
    }

    fn into_macaroon(self) -> Result<Macaroon> {
        if self.v != 2 {
            return Err(MacaroonError::DeserializationError(format!(
                "unsupported JSON version {}",
                self.v
            )));
        }
        let mut builder = MacaroonBuilder::new(Version::V2);
        match merge_field(self.i, self.i64, "identifier")? {
            Some(identifier) => builder.set_identifier(identifier),
            None => {
                return Err(MacaroonError::DeserializationError(String::from(
                    "no identifier found",
                )))
            }
        }
        if let Some(location) = self.l {
            builder.set_location(location);
        }
        match merge_field(self.s, self.s64, "signature")? {
            Some(signature) => builder.set_signature(signature),
            None => {
                return Err(MacaroonError::DeserializationError(String::from(
                    "no signature found",
                )))
            }
        }
        for caveat in self.c {
            let mut caveat_builder = CaveatBuilder::new();
            match merge_field(caveat.i, caveat.i64, "caveat id")? {
                Some(id) => caveat_builder.add_id(id),
                None => {
                    return Err(MacaroonError::DeserializationError(String::from(
                        "no caveat id found",
                    )))
                }
            }
            if let Some(vid) = merge_field(caveat.v, caveat.v64, "verification id")? {
                caveat_builder.add_verifier_id(vid);
            }
            if let Some(location) = caveat.l {
                caveat_builder.add_location(location);
            }
            builder.add_caveat(caveat_builder.build()?);
        }
        builder.build()
    }
}

/// Serialize one macaroon in the JSON object form of its version.
pub fn serialize(macaroon: &Macaroon) -> Result<Vec<u8>> {
    let text = match macaroon.version() {
        Version::V1 => serde_json::to_string(&SerializationV1::from_macaroon(macaroon)?)?,
        Version::V2 => serde_json::to_string(&SerializationV2::from_macaroon(macaroon))?,
    };
    Ok(text.into_bytes())
}

/// Serialize a slice of macaroons as a JSON array.
pub fn serialize_slice(macaroons: &[Macaroon]) -> Result<Vec<u8>> {
    let mut values = Vec::with_capacity(macaroons.len());
    for macaroon in macaroons {
        match macaroon.version() {
            Version::V1 => {
                values.push(serde_json::to_value(SerializationV1::from_macaroon(macaroon)?)?)
            }
            Version::V2 => {
                values.push(serde_json::to_value(SerializationV2::from_macaroon(macaroon))?)
            }
        }
    }
    Ok(serde_json::to_string(&values)?.into_bytes())
}

fn value_into_macaroon(value: serde_json::Value) -> Result<Macaroon> {
    // The V2 form is recognizable by its version marker; everything else
    // is tried as the V1 object form.
    if value.get("v").is_some() {
        serde_json::from_value::<SerializationV2>(value)?.into_macaroon()
    } else {
        serde_json::from_value::<SerializationV1>(value)?.into_macaroon()
    }
}

/// Decode a single macaroon from either JSON object form.
pub fn deserialize(data: &[u8]) -> Result<Macaroon> {
    value_into_macaroon(serde_json::from_slice(data)?)
}

/// Decode a JSON array of macaroons.
pub fn deserialize_slice(data: &[u8]) -> Result<Vec<Macaroon>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(data)?;
    let mut macaroons = Vec::with_capacity(values.len());
    for value in values {
        macaroons.push(value_into_macaroon(value)?);
    }
    if macaroons.is_empty() {
        return Err(MacaroonError::DeserializationError(String::from(
            "no macaroons in input",
        )));
    }
    Ok(macaroons)
}
