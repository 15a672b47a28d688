use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;

use crate::error::MacaroonError;
use crate::macaroon::Macaroon;
use crate::Result;

pub mod json;
pub mod macaroon_builder;
pub mod v1;
pub mod v2;

/// The serialization formats a macaroon can travel in.
pub enum Format {
    V1,
    V2,
    V2JSON,
}

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Encode bytes as URL-safe unpadded base64, the only alphabet this crate
/// emits.
pub fn base64_encode(data: &[u8]) -> String {
    URL_SAFE_ENGINE.encode(data)
}

/// Decode base64 in any of the four common shapes: standard or URL-safe
/// alphabet, padded or unpadded. Over-padded input is rejected.
pub fn base64_decode(data: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(data)?;
    if text.bytes().any(|b| b == b'+' || b == b'/') {
        Ok(STANDARD_ENGINE.decode(text)?)
    } else {
        Ok(URL_SAFE_ENGINE.decode(text)?)
    }
}

/// Serialize a single macaroon. V1 is emitted in its historical
/// interchange form (packets wrapped in URL-safe unpadded base64), V2 as
/// raw field-tagged binary, V2JSON as a JSON object.
pub fn serialize(macaroon: &Macaroon, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::V1 => Ok(base64_encode(&v1::serialize(macaroon)?).into_bytes()),
        Format::V2 => v2::serialize(macaroon),
        Format::V2JSON => json::serialize(macaroon),
    }
}

/// Serialize a slice of macaroons (primary plus discharges). Binary forms
/// concatenate at the packet/frame layer; V2JSON produces a JSON array.
pub fn serialize_slice(macaroons: &[Macaroon], format: Format) -> Result<Vec<u8>> {
    match format {
        Format::V1 => Ok(base64_encode(&v1::serialize_slice(macaroons)?).into_bytes()),
        Format::V2 => v2::serialize_slice(macaroons),
        Format::V2JSON => json::serialize_slice(macaroons),
    }
}

/// Deserialize a single macaroon, sniffing the format from the leading
/// byte: `{` means JSON, 0x02 raw V2 binary, anything else base64 over a
/// binary form (falling back to raw V1 packets).
pub fn deserialize(data: &[u8]) -> Result<Macaroon> {
    match data.first() {
        None => Err(MacaroonError::DeserializationError(String::from(
            "empty input",
        ))),
        Some(b'{') => json::deserialize(data),
        Some(&v2::VERSION_BYTE) => v2::deserialize(data),
        Some(_) => match base64_decode(data) {
            Ok(decoded) if decoded.first() == Some(&v2::VERSION_BYTE) => v2::deserialize(&decoded),
            Ok(decoded) => v1::deserialize(&decoded),
            Err(err) => {
                debug!("deserialize: not base64 ({}), trying raw V1 packets", err);
                v1::deserialize(data)
            }
        },
    }
}

/// Deserialize a slice of macaroons; same sniffing as [`deserialize`],
/// with `[` selecting a JSON array.
pub fn deserialize_slice(data: &[u8]) -> Result<Vec<Macaroon>> {
    match data.first() {
        None => Err(MacaroonError::DeserializationError(String::from(
            "empty input",
        ))),
        Some(b'[') => json::deserialize_slice(data),
        Some(&v2::VERSION_BYTE) => v2::deserialize_slice(data),
        Some(_) => match base64_decode(data) {
            Ok(decoded) if decoded.first() == Some(&v2::VERSION_BYTE) => {
                v2::deserialize_slice(&decoded)
            }
            Ok(decoded) => v1::deserialize_slice(&decoded),
            Err(err) => {
                debug!("deserialize_slice: not base64 ({}), trying raw V1 packets", err);
                v1::deserialize_slice(data)
            }
        },
    }
}
