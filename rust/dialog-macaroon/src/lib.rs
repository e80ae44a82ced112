#![warn(missing_docs)]

//! Macaroon bearer tokens.
//!
//! A [`Macaroon`] is a bearer credential whose signature is an HMAC chain
//! over its identifier and every caveat attached to it. Anyone holding a
//! macaroon can attenuate it by appending caveats, but only the holder of
//! the root key can check the chain.
//!
//! # Overview
//!
//! The protocol has three roles:
//!
//! 1. An issuer mints a root macaroon with [`Macaroon::new`] and restricts
//!    it with first-party caveats ([`Macaroon::add_predicate`]) and
//!    third-party caveats ([`Macaroon::add_third_party_caveat`]).
//! 2. A discharger proves a third-party condition by minting a discharge
//!    macaroon whose identifier is the caveat id.
//! 3. The caller binds each discharge to the root signature with
//!    [`Macaroon::bind`] and presents the set to the issuer, which runs
//!    [`verify`].
//!
//! # Example
//!
//! ```rust
//! use dialog_macaroon::{Macaroon, Predicate, verify};
//!
//! let mut root = Macaroon::new(b"root secret", "session", "https://issuer")?;
//! root.add_third_party_caveat(b"discharge key", "is-authenticated", "https://login")?;
//!
//! let mut discharge = Macaroon::new(b"discharge key", "is-authenticated", "remote")?;
//! discharge.add_predicate(&Predicate::Email("me@nope.com".into()))?;
//! let discharge = discharge.bind(root.signature());
//!
//! let authorization = verify(
//!     &root,
//!     b"root secret",
//!     &dialog_macaroon::accept_all,
//!     &[discharge],
//! )?;
//! assert_eq!(authorization.email.as_deref(), Some("me@nope.com"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod caveat;
pub use caveat::*;

mod codec;
pub use codec::*;

mod error;
pub use error::*;

mod key;
pub use key::*;

mod macaroon;
pub use macaroon::*;

mod predicate;
pub use predicate::*;

mod seal;
pub use seal::*;

mod signature;
pub use signature::*;

pub mod verify;
pub use verify::{Authorization, CaveatCheck, accept_all, verify};
