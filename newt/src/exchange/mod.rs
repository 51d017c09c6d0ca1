//! The reliability engine: message-ID deduplication, retransmission
//! with binary exponential backoff, and ACK/RST correlation.
//!
//! [`Exchanges`] owns one sent-side and one received-side
//! [`MessageCache`](crate::cache::MessageCache) per remote peer. It
//! is single-threaded and externally clocked: no threads, no timers,
//! no I/O. Time only advances when the driver calls
//! [`Exchanges::service`] with an [`Instant`] from its clock, and
//! every transmission the engine wants comes back as an [`Effect`]
//! for the driver to flush to its [`Socket`](crate::net::Socket).
//!
//! In a multi-threaded host, put a mutex (or a single-writer actor)
//! around each `Exchanges`; nothing finer-grained is needed, and
//! nothing here takes locks of its own.

use std::collections::BTreeMap;

use embedded_time::Instant;
use newt_msg::{Id, Message, MessageValidationError, OptValue, Type};
use no_std_net::SocketAddr;

/// Received-side cache entries
pub mod rcvd;

/// Sent-side cache entries
pub mod sent;

pub use rcvd::*;
pub use sent::*;

use crate::cache::MessageCache;
use crate::config::TransmissionParameters;
use crate::endpoint::{EndpointHandle, EndpointTable, SecurityMode};
use crate::logging::msg_summary;
use crate::net::Addrd;
use crate::time::{since_epoch, Clock, Millis};

/// Externally-performed I/O the engine asks its driver for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
  /// Put these bytes on the wire
  Send(Addrd<Vec<u8>>),
}

/// Why a reply could not be attached to an exchange.
///
/// The reply slot on both cache entry kinds is write-once and picky;
/// an incompatible assignment is diagnosed, never silently accepted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReplyError {
  /// No live exchange carries this message ID (or, on direct entry
  /// use, the IDs differ)
  IdMismatch {
    /// The reply's message ID
    id: Id,
  },
  /// The reply carries a non-empty code that is not a response code
  NotResponse,
  /// A piggy-backed response must ride an Ack
  ResponseNotAck,
  /// A piggy-backed response must echo the request's token
  TokenMismatch,
  /// A reply was already recorded for this exchange
  AlreadyGiven,
}

/// What became of an inbound Con/Non handed to
/// [`Exchanges::received`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
  /// First arrival of this (source, message ID); hand it to
  /// application logic
  New,
  /// A retransmitted duplicate; the cached reply (if any) was resent
  /// and application logic must not run again
  Duplicate {
    /// Total arrivals including this one
    reception_count: u32,
  },
}

/// Outcome of servicing one due cache entry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Serviced {
  /// The entry picked a new `time_due`; re-sort it into the queue
  Rescheduled,
  /// The entry is finished; drop it from its cache
  Dispose,
}

#[derive(Debug, Default)]
struct PeerCaches {
  sent: MessageCache<SentEntry>,
  rcvd: MessageCache<RcvdEntry>,
}

/// Default Max-Age for sent responses when the option is absent
/// (RFC 7252 §5.10.5: 60 seconds)
const DEFAULT_MAX_AGE_MS: u64 = 60_000;

/// The reliability engine for one local endpoint. See the [module
/// docs](self) for the drive model.
///
/// ```no_run
/// use embedded_time::Clock as _;
/// use newt::config::TransmissionParameters;
/// use newt::exchange::Exchanges;
/// use newt_msg::{Code, Id, Message, Token, Type};
/// use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};
///
/// let mut exchanges = Exchanges::new(TransmissionParameters::default());
/// let clock = newt::std::Clock::new();
/// let dest = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 1), 5683));
///
/// let req = Message::new(Type::Con, Code::GET, Id(0), Token::opaque(b"corr-1"));
/// let mut effects = Vec::new();
/// let _id = exchanges.send(req, dest, clock.try_now().unwrap()).unwrap();
/// exchanges.service(clock.try_now().unwrap(), &mut effects);
/// // flush `effects` to the socket, poll it, feed replies back in...
/// ```
#[derive(Debug)]
pub struct Exchanges {
  params: TransmissionParameters,
  endpoints: EndpointTable,
  peers: BTreeMap<EndpointHandle, PeerCaches>,
}

impl Exchanges {
  /// An engine with no exchanges in flight
  pub fn new(params: TransmissionParameters) -> Self {
    Exchanges { params,
                endpoints: EndpointTable::new(),
                peers: BTreeMap::new() }
  }

  /// The parameters the engine runs with
  pub fn params(&self) -> &TransmissionParameters {
    &self.params
  }

  /// Queue a Con or Non message toward `dest`, allocating its message
  /// ID. The first transmission happens on the next
  /// [`Exchanges::service`] call (the fresh entry is due
  /// immediately).
  ///
  /// Validates the message (rewriting its options into canonical
  /// form) before accepting it. Panics if handed an Ack or Reset:
  /// those are replies and go through [`Exchanges::reply`].
  pub fn send<C: Clock>(&mut self,
                        mut msg: Message,
                        dest: SocketAddr,
                        now: Instant<C>)
                        -> Result<Id, MessageValidationError> {
    match msg.ty {
      | Type::Con | Type::Non => {},
      | Type::Ack | Type::Reset => panic!("ACK/RST are replies; send them with reply(), not send()"),
    }
    msg.validate()?;

    let now = since_epoch(now);
    let schedule_for = |id: Id| self.params.retransmission_schedule(now.0 ^ u64::from(id.0));
    let stale_at = Self::stale_at(&msg, now);

    let handle = self.endpoints.intern(dest, SecurityMode::NoSec);
    let peer = self.peers.entry(handle).or_default();

    let id = peer.sent.next_id();
    msg.id = id;
    let schedule = match msg.ty {
      | Type::Con => Some(schedule_for(id)),
      | _ => None,
    };

    log::debug!("{} -> {}: queued", msg_summary(&msg), dest);
    peer.sent.insert(SentEntry::new(msg, dest, now, schedule, stale_at));
    Ok(id)
  }

  /// Handle an inbound Con/Non from `source`: either the first
  /// arrival (cache it, tell the caller to process it) or a
  /// retransmitted duplicate (count it, resend the cached reply, tell
  /// the caller to do nothing).
  ///
  /// Deduplication is scoped per source endpoint, per RFC 7252 §4.5.
  /// Panics if handed an Ack or Reset: those are never cached on the
  /// receiving side and go through [`Exchanges::process_reply`].
  pub fn received<C: Clock>(&mut self,
                            msg: &Message,
                            source: SocketAddr,
                            now: Instant<C>,
                            effects: &mut Vec<Effect>)
                            -> Receipt {
    let lifetime = match msg.ty {
      | Type::Con => self.params.exchange_lifetime(),
      | Type::Non => self.params.non_lifetime(),
      | Type::Ack | Type::Reset => {
        panic!("ACK/RST are message-layer replies; feed them to process_reply()")
      },
    };

    let now = since_epoch(now);
    let handle = self.endpoints.intern(source, SecurityMode::NoSec);

    if self.peers
           .iter()
           .any(|(h, p)| *h != handle && p.rcvd.contains(msg.id))
    {
      // not a duplicate: IDs are scoped per source endpoint. Worth a
      // note when hunting misbehaving peers, though.
      log::debug!("message ID {} is also live in another endpoint's received cache", msg.id.0);
    }

    let peer = self.peers.entry(handle).or_default();
    match peer.rcvd.get_mut(msg.id) {
      | Some(entry) => {
        entry.duplicate(effects);
        Receipt::Duplicate { reception_count: entry.reception_count() }
      },
      | None => {
        log::debug!("{} <- {}: cached", msg_summary(msg), source);
        peer.rcvd.insert(RcvdEntry::new(msg.clone(), source, now, lifetime));
        Receipt::New
      },
    }
  }

  /// Answer a received Con/Non: an empty Reset (`reset = true`), an
  /// empty Ack, or an Ack piggy-backing `response`. The reply is
  /// validated against the received message, recorded write-once on
  /// its entry, and transmitted immediately.
  ///
  /// Panics if `reset` is set *and* a response is supplied.
  pub fn reply(&mut self,
               source: SocketAddr,
               id: Id,
               reset: bool,
               response: Option<Message>,
               effects: &mut Vec<Effect>)
               -> Result<(), ReplyError> {
    let reply = match (reset, response) {
      | (true, Some(_)) => panic!("a Reset reply cannot carry a response"),
      | (true, None) => Message::reset(id),
      | (false, None) => Message::empty_ack(id),
      | (false, Some(mut response)) => {
        response.ty = Type::Ack;
        response.id = id;
        response
      },
    };

    let entry = self.endpoints
                    .get(source, SecurityMode::NoSec)
                    .and_then(|handle| self.peers.get_mut(&handle))
                    .and_then(|peer| peer.rcvd.get_mut(id))
                    .ok_or(ReplyError::IdMismatch { id })?;
    entry.set_reply(reply, effects)
  }

  /// Correlate an inbound Ack/Reset from `source` against the sent
  /// cache. A matching first reply completes its exchange
  /// immediately, whatever backoff phase it is in; a *second*
  /// matching reply is a protocol anomaly that is logged and
  /// ignored. Mismatches come back as the specific [`ReplyError`]
  /// for the caller's diagnostics.
  pub fn process_reply(&mut self, reply: &Message, source: SocketAddr) -> Result<(), ReplyError> {
    match reply.ty {
      | Type::Ack | Type::Reset => {},
      | Type::Con | Type::Non => panic!("CON/NON are not replies; feed them to received()"),
    }

    let exchange_lifetime = self.params.exchange_lifetime();
    let not_found = ReplyError::IdMismatch { id: reply.id };
    let peer = self.endpoints
                   .get(source, SecurityMode::NoSec)
                   .and_then(|handle| self.peers.get_mut(&handle))
                   .ok_or(not_found)?;
    let entry = peer.sent.get_mut(reply.id).ok_or(not_found)?;

    match entry.process_reply(reply.clone(), exchange_lifetime) {
      | Ok(()) => {
        // completion moved the entry's due time; restore queue order
        peer.sent.reschedule(reply.id);
        Ok(())
      },
      | Err(ReplyError::AlreadyGiven) => {
        log::warn!("{}: second reply for one exchange; ignoring it", msg_summary(reply));
        Ok(())
      },
      | Err(e) => Err(e),
    }
  }

  /// Advance every exchange whose `time_due` has been reached, in due
  /// order: first transmissions, retransmissions, backoff
  /// exhaustion, lifetime expiry and cache eviction all happen here.
  /// Each due entry is serviced once per call.
  pub fn service<C: Clock>(&mut self, now: Instant<C>, effects: &mut Vec<Effect>) {
    let now = since_epoch(now);
    let params = self.params;

    for peer in self.peers.values_mut() {
      for id in peer.sent.due(now) {
        let entry = peer.sent.get_mut(id).expect("due ids are cached");
        match entry.process_timeout(&params, effects) {
          | Serviced::Rescheduled => peer.sent.reschedule(id),
          | Serviced::Dispose => {
            peer.sent.remove(id);
          },
        }
      }

      for id in peer.rcvd.due(now) {
        let entry = peer.rcvd.remove(id);
        log::debug!("{}: receive window expired after {} arrivals",
                    msg_summary(entry.message()),
                    entry.reception_count());
      }
    }
  }

  /// The sent-cache entry tracking `id` toward `dest`, if still live
  pub fn sent_entry(&self, dest: SocketAddr, id: Id) -> Option<&SentEntry> {
    self.endpoints
        .get(dest, SecurityMode::NoSec)
        .and_then(|handle| self.peers.get(&handle))
        .and_then(|peer| peer.sent.get(id))
  }

  /// The received-cache entry tracking `id` from `source`, if still
  /// live
  pub fn rcvd_entry(&self, source: SocketAddr, id: Id) -> Option<&RcvdEntry> {
    self.endpoints
        .get(source, SecurityMode::NoSec)
        .and_then(|handle| self.peers.get(&handle))
        .and_then(|peer| peer.rcvd.get(id))
  }

  fn stale_at(msg: &Message, now: Millis) -> Option<Millis> {
    use embedded_time::duration::Milliseconds;
    use newt_msg::known;

    if !msg.code.kind().map(|k| k.is_response()).unwrap_or(false) {
      return None;
    }
    let max_age_ms = match msg.option(known::MAX_AGE.num()).map(|opt| opt.value()) {
      | Some(OptValue::Uint(seconds)) => seconds.saturating_mul(1_000),
      | _ => DEFAULT_MAX_AGE_MS,
    };
    Some(Milliseconds(now.0 + max_age_ms))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::{dummy_addr, other_addr, ClockMock};
  use newt_msg::{Code, Payload, Token};

  fn engine() -> Exchanges {
    Exchanges::new(TransmissionParameters::default())
  }

  fn send_bytes(effect: &Effect) -> &[u8] {
    let Effect::Send(addrd) = effect;
    addrd.data()
  }

  #[test]
  fn con_is_retransmitted_until_removal() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let dest = dummy_addr();

    let req = Message::new(Type::Con, Code::GET, Id(0), Token::opaque(b"t1"));
    let id = exchanges.send(req, dest, ClockMock::instant(0)).unwrap();

    assert_eq!(exchanges.sent_entry(dest, id).unwrap().state(),
               SentState::Untransmitted);

    // drive the entry by its own schedule until the cache drops it
    let mut states = Vec::new();
    let mut rounds = 0;
    while let Some(entry) = exchanges.sent_entry(dest, id) {
      let due = entry.time_due();
      exchanges.service(ClockMock::instant(due.0), &mut effects);
      if let Some(entry) = exchanges.sent_entry(dest, id) {
        states.push(entry.state());
      }
      rounds += 1;
      assert!(rounds < 16, "lifecycle did not terminate");
    }

    // MAX_RETRANSMIT + 1 transmissions total, no reply ever
    assert_eq!(effects.len(), 5);
    assert!(effects.iter().all(|e| send_bytes(e) == send_bytes(&effects[0])));
    assert_eq!(states.last(), Some(&SentState::Completed));
    assert!(states.contains(&SentState::FinalAckWait));
  }

  #[test]
  fn con_exchange_ids_skip_live_ones() {
    let mut exchanges = engine();
    let dest = dummy_addr();

    let a = exchanges.send(Message::new(Type::Con, Code::GET, Id(0), Token::default()),
                           dest,
                           ClockMock::instant(0))
                     .unwrap();
    let b = exchanges.send(Message::new(Type::Con, Code::GET, Id(0), Token::default()),
                           dest,
                           ClockMock::instant(0))
                     .unwrap();
    assert_eq!((a, b), (Id(0), Id(1)));
  }

  #[test]
  fn non_is_transmitted_once() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let dest = dummy_addr();

    let req = Message::new(Type::Non, Code::GET, Id(0), Token::opaque(b"t2"));
    let id = exchanges.send(req, dest, ClockMock::instant(0)).unwrap();
    exchanges.service(ClockMock::instant(0), &mut effects);

    let entry = exchanges.sent_entry(dest, id).unwrap();
    assert_eq!(entry.state(), SentState::Completed);
    assert_eq!(entry.transmissions(), 1);
    assert_eq!(entry.time_due().0, 145_000);
    assert_eq!(effects.len(), 1);

    // no retransmission at any later point, just eviction
    exchanges.service(ClockMock::instant(145_000), &mut effects);
    assert_eq!(effects.len(), 1);
    assert!(exchanges.sent_entry(dest, id).is_none());
  }

  #[test]
  fn reset_completes_a_pending_con() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let dest = dummy_addr();

    let req = Message::new(Type::Con, Code::GET, Id(0), Token::opaque(b"t3"));
    let id = exchanges.send(req, dest, ClockMock::instant(0)).unwrap();
    exchanges.service(ClockMock::instant(0), &mut effects);
    assert_eq!(effects.len(), 1);

    exchanges.process_reply(&Message::reset(id), dest).unwrap();

    let entry = exchanges.sent_entry(dest, id).unwrap();
    assert_eq!(entry.state(), SentState::Completed);
    assert_eq!(entry.time_due().0, 247_000);
    assert!(entry.reply().unwrap().is_reset());

    // no further retransmissions; eviction at EXCHANGE_LIFETIME
    exchanges.service(ClockMock::instant(247_000), &mut effects);
    assert_eq!(effects.len(), 1);
    assert!(exchanges.sent_entry(dest, id).is_none());
  }

  #[test]
  fn second_reply_is_logged_and_ignored() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let dest = dummy_addr();
    let token = Token::opaque(b"t4");

    let id = exchanges.send(Message::new(Type::Con, Code::GET, Id(0), token),
                            dest,
                            ClockMock::instant(0))
                      .unwrap();
    exchanges.service(ClockMock::instant(0), &mut effects);

    let ack = Message::new(Type::Ack, Code::CONTENT, id, token);
    exchanges.process_reply(&ack, dest).unwrap();
    // anomaly, not an error
    assert_eq!(exchanges.process_reply(&Message::reset(id), dest), Ok(()));
    assert!(exchanges.sent_entry(dest, id).unwrap().reply().unwrap().is_ack());
  }

  #[test]
  fn reply_mismatches_surface() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let dest = dummy_addr();

    let id = exchanges.send(Message::new(Type::Con, Code::GET, Id(0), Token::opaque(b"t5")),
                            dest,
                            ClockMock::instant(0))
                      .unwrap();
    exchanges.service(ClockMock::instant(0), &mut effects);

    // wrong id: nothing to correlate with
    assert_eq!(exchanges.process_reply(&Message::empty_ack(Id(999)), dest),
               Err(ReplyError::IdMismatch { id: Id(999) }));

    // right id, wrong token on a piggy-backed response
    let bad = Message::new(Type::Ack, Code::CONTENT, id, Token::opaque(b"other"));
    assert_eq!(exchanges.process_reply(&bad, dest),
               Err(ReplyError::TokenMismatch));
  }

  #[test]
  fn duplicates_are_counted_and_answered_from_cache() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let source = dummy_addr();

    let req = Message::new(Type::Con, Code::GET, Id(77), Token::opaque(b"t6"));
    assert_eq!(exchanges.received(&req, source, ClockMock::instant(0), &mut effects),
               Receipt::New);
    assert_eq!(exchanges.received(&req, source, ClockMock::instant(100), &mut effects),
               Receipt::Duplicate { reception_count: 2 });
    // no reply chosen yet: nothing on the wire
    assert!(effects.is_empty());

    let mut response = Message::new(Type::Ack, Code::CONTENT, Id(77), req.token);
    response.payload = Payload(b"21.5 C".to_vec());
    exchanges.reply(source, Id(77), false, Some(response), &mut effects)
             .unwrap();
    assert_eq!(effects.len(), 1);

    assert_eq!(exchanges.received(&req, source, ClockMock::instant(200), &mut effects),
               Receipt::Duplicate { reception_count: 3 });
    assert_eq!(effects.len(), 2);
    assert_eq!(send_bytes(&effects[1]), send_bytes(&effects[0]));
  }

  #[test]
  fn dedup_is_scoped_per_source() {
    let mut exchanges = engine();
    let mut effects = Vec::new();

    let req = Message::new(Type::Con, Code::GET, Id(77), Token::opaque(b"t7"));
    assert_eq!(exchanges.received(&req, dummy_addr(), ClockMock::instant(0), &mut effects),
               Receipt::New);
    // same ID from a different endpoint is a fresh exchange
    assert_eq!(exchanges.received(&req, other_addr(), ClockMock::instant(0), &mut effects),
               Receipt::New);
  }

  #[test]
  fn rcvd_entries_expire() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let source = dummy_addr();

    let con = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    let non = Message::new(Type::Non, Code::GET, Id(2), Token::default());
    exchanges.received(&con, source, ClockMock::instant(0), &mut effects);
    exchanges.received(&non, source, ClockMock::instant(0), &mut effects);

    assert_eq!(exchanges.rcvd_entry(source, Id(1)).unwrap().time_due().0, 247_000);
    assert_eq!(exchanges.rcvd_entry(source, Id(2)).unwrap().time_due().0, 145_000);

    exchanges.service(ClockMock::instant(145_000), &mut effects);
    assert!(exchanges.rcvd_entry(source, Id(2)).is_none());
    assert!(exchanges.rcvd_entry(source, Id(1)).is_some());

    exchanges.service(ClockMock::instant(247_000), &mut effects);
    assert!(exchanges.rcvd_entry(source, Id(1)).is_none());

    // the ID may be seen as new again now
    assert_eq!(exchanges.received(&con, source, ClockMock::instant(247_001), &mut effects),
               Receipt::New);
  }

  #[test]
  fn reply_to_unknown_exchange_is_id_mismatch() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    assert_eq!(exchanges.reply(dummy_addr(), Id(9), false, None, &mut effects),
               Err(ReplyError::IdMismatch { id: Id(9) }));
  }

  #[test]
  fn second_rcvd_reply_is_rejected() {
    let mut exchanges = engine();
    let mut effects = Vec::new();
    let source = dummy_addr();

    let req = Message::new(Type::Con, Code::GET, Id(5), Token::default());
    exchanges.received(&req, source, ClockMock::instant(0), &mut effects);
    exchanges.reply(source, Id(5), false, None, &mut effects).unwrap();
    assert_eq!(exchanges.reply(source, Id(5), true, None, &mut effects),
               Err(ReplyError::AlreadyGiven));
  }

  #[test]
  #[should_panic(expected = "replies")]
  fn sending_an_ack_through_send_panics() {
    let mut exchanges = engine();
    exchanges.send(Message::empty_ack(Id(1)), dummy_addr(), ClockMock::instant(0))
             .ok();
  }

  #[test]
  fn stale_at_honors_max_age() {
    use newt_msg::Opt;

    let now = embedded_time::duration::Milliseconds(1_000_u64);

    // a request never goes stale
    let req = Message::new(Type::Con, Code::GET, Id(0), Token::default());
    assert_eq!(Exchanges::stale_at(&req, now), None);

    // a response without Max-Age uses the 60 s default
    let resp = Message::new(Type::Con, Code::CONTENT, Id(0), Token::default());
    assert_eq!(Exchanges::stale_at(&resp, now), Some(embedded_time::duration::Milliseconds(61_000_u64)));

    // an explicit Max-Age wins
    let mut resp = Message::new(Type::Con, Code::CONTENT, Id(0), Token::default());
    resp.opts.push(Opt::max_age(5).unwrap());
    assert_eq!(Exchanges::stale_at(&resp, now), Some(embedded_time::duration::Milliseconds(6_000_u64)));
  }
}
