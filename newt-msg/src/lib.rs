//! Low-level representation of CoAP messages.
//!
//! This crate is the wire half of the `newt` workspace: it turns
//! [`Message`]s into the byte-exact RFC 7252 binary format and back,
//! and gives CoAP options a typed surface ([`OptValue`]) backed by the
//! core option registry ([`msg::opt::known`]).
//!
//! ## Decoding is lenient where the RFC says so
//! Two things about decoding are easy to get wrong and are worth
//! calling out:
//! - A datagram whose version field is not 1 is *ignored*, not
//!   rejected: [`Message::try_from_bytes`] returns `Ok(None)` for it.
//! - Options that are unknown, or whose value violates the registered
//!   format, are not errors. They decode to
//!   [`OptValue::Unrecognized`] and flow through the rest of the
//!   system as opaque bytes.
//!
//! Everything else malformed is a [`MessageParseError`] carrying
//! whatever header fields were recovered before the failure, so the
//! layer above can pick the right RFC 7252 §4.2/§4.3 reaction.

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]

pub mod cursor;

/// Message structs
pub mod msg;

#[doc(inline)]
pub use msg::*;
