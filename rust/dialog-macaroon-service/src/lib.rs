#![warn(missing_docs)]

//! Services around [`dialog_macaroon`] tokens.
//!
//! - [`Issuer`] mints root macaroons scoped to a [`PermissionRequest`], each
//!   with a third-party caveat addressed to the discharger
//! - [`Discharger`] authenticates the caller through an [`Authenticator`] and
//!   mints the discharge macaroon for that caveat
//! - [`Authority`] verifies a root macaroon with its bound discharges
//!
//! Issuer and discharger share nothing but the secrets in [`Settings`]; the
//! discharge key travels inside the caveat id as a sealed [`Ticket`].

mod authenticate;
pub use authenticate::*;

mod authority;
pub use authority::*;

mod discharger;
pub use discharger::*;

mod error;
pub use error::*;

mod issuer;
pub use issuer::*;

mod request;
pub use request::*;

mod settings;
pub use settings::*;

mod ticket;
pub use ticket::*;
