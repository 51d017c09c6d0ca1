//! CoAP message-layer reliability.
//!
//! UDP loses, duplicates and reorders datagrams; RFC 7252 §4 layers
//! just enough state on top to make request/response workable:
//! Confirmable messages are retransmitted with binary exponential
//! backoff until acknowledged, message IDs deduplicate retransmitted
//! arrivals, and ACK/RST messages correlate back to the exchange they
//! answer. This crate is that layer, built on the
//! [`newt_msg`] codec.
//!
//! The engine ([`exchange::Exchanges`]) does no I/O and keeps no
//! threads or timers: the driver owns the socket and the clock,
//! feeds inbound messages in, services due timeouts, and flushes the
//! [`exchange::Effect`]s the engine emits. That makes every state
//! transition reproducible under a mocked clock, which is how the
//! tests here drive whole exchange lifecycles without waiting 247
//! seconds for real ones.
//!
//! What lives where:
//! - [`config`]: the RFC transmission parameters and their derived
//!   timing bounds
//! - [`retry`]: the doubling retransmission schedule
//! - [`cache`]: the per-peer, per-direction message cache
//! - [`exchange`]: the sent/received state machines and the engine
//! - [`endpoint`]: interned endpoint identities
//! - [`net`] / [`std`]: the socket seam and its `std` implementation

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]

/// Message caches
pub mod cache;

/// Transmission parameters
pub mod config;

/// Endpoint identities
pub mod endpoint;

/// The reliability engine
pub mod exchange;

pub(crate) mod logging;

/// Addresses & the socket seam
pub mod net;

/// Retransmission schedules
pub mod retry;

pub mod std;


/// Clocks & durations
pub mod time;
