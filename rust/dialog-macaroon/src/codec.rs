//! Versioned wire format for macaroons.
//!
//! The binary form is a DAG-CBOR map:
//!
//! ```text
//! { "v": 2, "i": <identifier>, "l": <location>, "c": [<caveat>...], "s": <signature> }
//! ```
//!
//! where each caveat is `{ "i": <id> }` for first-party caveats and
//! `{ "i": <id>, "v": <verification id>, "l": <location> }` for third-party
//! caveats. The text form is the binary form in URL-safe base64 without
//! padding.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{Caveat, CodecError, Macaroon, Signature};

/// The encoding version written by this crate.
pub const MACAROON_VERSION: u64 = 2;

const BUNDLE_SEPARATOR: &str = ",";

#[derive(Serialize, Deserialize)]
pub(crate) struct WireMacaroon {
    #[serde(rename = "v")]
    version: u64,
    #[serde(rename = "i", with = "serde_bytes")]
    identifier: Vec<u8>,
    #[serde(rename = "l")]
    location: String,
    #[serde(rename = "c")]
    caveats: Vec<WireCaveat>,
    #[serde(rename = "s", with = "serde_bytes")]
    signature: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireCaveat {
    #[serde(rename = "i", with = "serde_bytes")]
    id: Vec<u8>,
    #[serde(
        rename = "v",
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_bytes"
    )]
    verification_id: Option<Vec<u8>>,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl From<Macaroon> for WireMacaroon {
    fn from(macaroon: Macaroon) -> Self {
        WireMacaroon {
            version: MACAROON_VERSION,
            identifier: macaroon.identifier,
            location: macaroon.location,
            caveats: macaroon.caveats.into_iter().map(WireCaveat::from).collect(),
            signature: macaroon.signature.as_bytes().to_vec(),
        }
    }
}

impl From<Caveat> for WireCaveat {
    fn from(caveat: Caveat) -> Self {
        match caveat {
            Caveat::FirstParty { condition } => WireCaveat {
                id: condition,
                verification_id: None,
                location: None,
            },
            Caveat::ThirdParty {
                id,
                verification_id,
                location,
            } => WireCaveat {
                id,
                verification_id: Some(verification_id),
                location: Some(location),
            },
        }
    }
}

impl TryFrom<WireMacaroon> for Macaroon {
    type Error = CodecError;

    fn try_from(wire: WireMacaroon) -> Result<Self, Self::Error> {
        if wire.version != MACAROON_VERSION {
            return Err(CodecError::UnsupportedVersion(wire.version));
        }
        if wire.identifier.is_empty() {
            return Err(CodecError::InvalidInput("identifier must not be empty"));
        }

        let signature = Signature::try_from(wire.signature.as_slice())
            .map_err(|_| CodecError::InvalidSignatureLength(wire.signature.len()))?;

        let caveats = wire
            .caveats
            .into_iter()
            .enumerate()
            .map(|(index, caveat)| caveat.into_caveat(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Macaroon {
            identifier: wire.identifier,
            location: wire.location,
            caveats,
            signature,
        })
    }
}

impl WireCaveat {
    fn into_caveat(self, index: usize) -> Result<Caveat, CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::InvalidCaveat {
                index,
                reason: "empty id",
            });
        }

        match (self.verification_id, self.location) {
            (None, None) => Ok(Caveat::FirstParty { condition: self.id }),
            (Some(verification_id), Some(location)) => Ok(Caveat::ThirdParty {
                id: self.id,
                verification_id,
                location,
            }),
            _ => Err(CodecError::InvalidCaveat {
                index,
                reason: "third-party caveats need both a verification id and a location",
            }),
        }
    }
}

impl Serialize for Macaroon {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireMacaroon::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Macaroon {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireMacaroon::deserialize(deserializer)?;
        Macaroon::try_from(wire).map_err(serde::de::Error::custom)
    }
}

impl Macaroon {
    /// Encodes this macaroon as DAG-CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_ipld_dagcbor::to_vec(&WireMacaroon::from(self.clone()))
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decodes a macaroon from DAG-CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire: WireMacaroon =
            serde_ipld_dagcbor::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Macaroon::try_from(wire)
    }

    /// Encodes this macaroon as URL-safe base64 text.
    pub fn to_base64(&self) -> Result<String, CodecError> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_bytes()?))
    }

    /// Decodes a macaroon from URL-safe base64 text. Trailing padding is
    /// tolerated.
    pub fn from_base64(text: &str) -> Result<Self, CodecError> {
        let bytes = URL_SAFE_NO_PAD.decode(text.trim().trim_end_matches('='))?;
        Macaroon::from_bytes(&bytes)
    }
}

/// Encodes a root macaroon and its discharges as one line of text.
///
/// The tokens are base64 encoded and joined by `,`, root first, so a
/// transport can carry the whole set in a single header value.
pub fn encode_bundle(root: &Macaroon, discharges: &[Macaroon]) -> Result<String, CodecError> {
    let mut parts = Vec::with_capacity(discharges.len() + 1);
    parts.push(root.to_base64()?);
    for discharge in discharges {
        parts.push(discharge.to_base64()?);
    }
    Ok(parts.join(BUNDLE_SEPARATOR))
}

/// Decodes a bundle produced by [`encode_bundle`].
pub fn decode_bundle(text: &str) -> Result<(Macaroon, Vec<Macaroon>), CodecError> {
    let mut parts = text
        .split(BUNDLE_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty());

    let root = parts
        .next()
        .ok_or(CodecError::InvalidInput("bundle is empty"))
        .and_then(Macaroon::from_base64)?;
    let discharges = parts.map(Macaroon::from_base64).collect::<Result<_, _>>()?;
    Ok((root, discharges))
}
