//! Third-party caveat ids.
//!
//! The issuer draws a fresh discharge root key for every root macaroon and
//! hands it to the discharger inside the caveat id itself: a [`Ticket`]
//! holding the condition and the key, DAG-CBOR encoded, sealed under a key
//! derived from the shared discharge secret, and written as URL-safe base64.
//! The discharger keeps no state; opening the ticket is the lookup.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use dialog_macaroon::{CryptoError, DerivedKey, KEY_SIZE, open, seal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Secret;

const TICKET_CONTEXT: &[u8] = b"dialog-macaroon-service/ticket";

/// Errors raised while sealing or opening a [`Ticket`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// The caveat id is not valid base64.
    #[error("caveat id is not valid base64")]
    Base64,

    /// The ticket could not be encoded.
    #[error("failed to encode ticket: {0}")]
    Encode(String),

    /// The opened payload is not a ticket.
    #[error("failed to decode ticket: {0}")]
    Decode(String),

    /// Sealing or opening failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The payload of a third-party caveat id.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "c")]
    condition: String,
    #[serde(rename = "k", with = "serde_bytes")]
    root_key: Vec<u8>,
}

impl Ticket {
    /// A ticket for `condition` with a fresh random discharge root key.
    pub fn generate(condition: impl Into<String>) -> Result<Self, TicketError> {
        let mut root_key = vec![0u8; KEY_SIZE];
        getrandom::getrandom(&mut root_key).map_err(CryptoError::Rng)?;
        Ok(Ticket {
            condition: condition.into(),
            root_key,
        })
    }

    /// The condition the discharger is asked to prove.
    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// The discharge root key.
    pub fn root_key(&self) -> &[u8] {
        &self.root_key
    }

    /// Seals this ticket into a caveat id.
    pub fn seal(&self, discharge_secret: &Secret) -> Result<String, TicketError> {
        let payload =
            serde_ipld_dagcbor::to_vec(self).map_err(|e| TicketError::Encode(e.to_string()))?;
        let sealed = seal(key(discharge_secret).as_bytes(), &payload)?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Opens a caveat id produced by [`Ticket::seal`].
    pub fn open(caveat_id: &str, discharge_secret: &Secret) -> Result<Self, TicketError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(caveat_id)
            .map_err(|_| TicketError::Base64)?;
        let payload = open(key(discharge_secret).as_bytes(), &sealed)?;
        serde_ipld_dagcbor::from_slice(&payload).map_err(|e| TicketError::Decode(e.to_string()))
    }
}

fn key(discharge_secret: &Secret) -> DerivedKey {
    DerivedKey::for_context(TICKET_CONTEXT, discharge_secret.expose())
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}
