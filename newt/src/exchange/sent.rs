use embedded_time::duration::Milliseconds;
use newt_msg::{CodeKind, Id, Message, Type};
use no_std_net::SocketAddr;

use super::{Effect, ReplyError, Serviced};
use crate::cache::CacheEntry;
use crate::config::TransmissionParameters;
use crate::logging::msg_summary;
use crate::net::Addrd;
use crate::retry::RetryTimeout;
use crate::time::Millis;

/// Where a sent message is in its reliability lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SentState {
  /// Queued; the first due service transmits it
  Untransmitted,
  /// Transmitted, no ACK/RST yet; due services retransmit
  Unacknowledged,
  /// All retransmissions spent; waiting out the doubled final delay
  /// for a late ACK
  FinalAckWait,
  /// Exchange over (replied to, or given up on); the entry only
  /// lingers so its message ID is not reused within the lifetime
  Completed,
  /// Dissociated from its cache
  Removed,
}

/// Cache entry for a message this endpoint sent.
///
/// All timing state is absolute milliseconds on the driving clock;
/// the entry never schedules anything itself. Transitions happen in
/// [`SentEntry::process_timeout`] (driven when `time_due` is
/// reached), except the reply transition, which arrives through
/// [`SentEntry::process_reply`] and always wins.
#[derive(Clone, Debug)]
pub struct SentEntry {
  msg: Message,
  packed: Vec<u8>,
  destination: SocketAddr,
  created: Millis,
  time_due: Millis,
  state: SentState,
  transmissions: u16,
  schedule: Option<RetryTimeout>,
  reply: Option<Message>,
  stale_at: Option<Millis>,
}

impl CacheEntry for SentEntry {
  fn id(&self) -> Id {
    self.msg.id
  }

  fn time_due(&self) -> Millis {
    self.time_due
  }
}

impl SentEntry {
  /// A freshly queued entry, due immediately. `schedule` is `Some`
  /// for confirmable messages, `None` for non-confirmable.
  pub(crate) fn new(msg: Message,
                    destination: SocketAddr,
                    created: Millis,
                    schedule: Option<RetryTimeout>,
                    stale_at: Option<Millis>)
                    -> Self {
    let packed = msg.to_bytes();
    SentEntry { msg,
                packed,
                destination,
                created,
                time_due: created,
                state: SentState::Untransmitted,
                transmissions: 0,
                schedule,
                reply: None,
                stale_at }
  }

  /// The message this entry tracks
  pub fn message(&self) -> &Message {
    &self.msg
  }

  /// Current lifecycle state
  pub fn state(&self) -> SentState {
    self.state
  }

  /// How many times the message has been put on the wire
  pub fn transmissions(&self) -> u16 {
    self.transmissions
  }

  /// The ACK/RST that answered this message, once one has
  pub fn reply(&self) -> Option<&Message> {
    self.reply.as_ref()
  }

  /// Where the message goes
  pub fn destination(&self) -> SocketAddr {
    self.destination
  }

  /// When the entry next needs service (absolute ms)
  pub fn time_due(&self) -> Millis {
    self.time_due
  }

  /// For sent responses: whether the Max-Age window has lapsed and a
  /// cached copy must no longer be served
  pub fn is_stale(&self, now: Millis) -> bool {
    matches!(self.stale_at, Some(at) if now.0 >= at.0)
  }

  /// Whether the exchange ended without any reply: every scheduled
  /// retransmission spent and the final wait elapsed. The caller
  /// reads this as request failure.
  pub fn timed_out(&self) -> bool {
    matches!(self.state, SentState::Completed | SentState::Removed) && self.reply.is_none()
      && self.schedule.is_some()
  }

  /// Drive the state machine one step; the caller invokes this when
  /// its clock reaches `time_due`.
  pub(crate) fn process_timeout(&mut self,
                                params: &TransmissionParameters,
                                effects: &mut Vec<Effect>)
                                -> Serviced {
    match self.state {
      | SentState::Untransmitted => {
        self.transmit(effects);
        match self.schedule.as_mut().map(|s| (s.next(), s.have_next())) {
          | Some((Some(delay), more)) => {
            self.time_due = Milliseconds(self.time_due.0 + delay.0);
            self.state = if more {
              SentState::Unacknowledged
            } else {
              SentState::FinalAckWait
            };
          },
          | Some((None, _)) => {
            // zero-length schedule: nothing to wait for
            self.complete(params.exchange_lifetime());
          },
          | None => {
            // non-confirmable: one transmission, then just hold the
            // ID until NON_LIFETIME runs out
            self.state = SentState::Completed;
            self.time_due = Milliseconds(self.created.0 + params.non_lifetime().0);
          },
        }
        Serviced::Rescheduled
      },

      | SentState::Unacknowledged => {
        self.transmit(effects);
        let schedule = self.schedule
                           .as_mut()
                           .expect("unacknowledged entries have a schedule");
        match (schedule.next(), schedule.have_next()) {
          | (Some(delay), true) => {
            self.time_due = Milliseconds(self.time_due.0 + delay.0);
          },
          | (Some(delay), false) => {
            // last scheduled delay, double the one before it: the
            // final-ACK wait
            self.time_due = Milliseconds(self.time_due.0 + delay.0);
            self.state = SentState::FinalAckWait;
          },
          | (None, _) => {
            let wait = schedule.current();
            self.time_due = Milliseconds(self.time_due.0 + wait.0);
            self.state = SentState::FinalAckWait;
          },
        }
        Serviced::Rescheduled
      },

      | SentState::FinalAckWait => {
        log::debug!("{}: gave up waiting for an ACK after {} transmissions",
                    msg_summary(&self.msg),
                    self.transmissions);
        self.complete(params.exchange_lifetime());
        Serviced::Rescheduled
      },

      | SentState::Completed => {
        self.state = SentState::Removed;
        Serviced::Dispose
      },

      | SentState::Removed => panic!("message ID {} was already removed from its cache", self.msg.id.0),
    }
  }

  /// Record the ACK/RST answering this message and complete the
  /// exchange, whatever backoff phase it is in. Write-once: see
  /// [`ReplyError`] for the rejection diagnoses.
  pub(crate) fn process_reply(&mut self, reply: Message, exchange_lifetime: Millis) -> Result<(), ReplyError> {
    self.check_reply(&reply)?;
    log::debug!("{}: answered by {}",
                msg_summary(&self.msg),
                msg_summary(&reply));
    self.reply = Some(reply);
    if self.state != SentState::Completed {
      self.complete(exchange_lifetime);
    }
    Ok(())
  }

  fn check_reply(&self, reply: &Message) -> Result<(), ReplyError> {
    if self.reply.is_some() {
      return Err(ReplyError::AlreadyGiven);
    }
    if reply.id != self.msg.id {
      return Err(ReplyError::IdMismatch { id: reply.id });
    }
    match reply.code.kind() {
      | Some(CodeKind::Empty) => Ok(()),
      | Some(kind) if kind.is_response() => {
        if reply.ty != Type::Ack {
          Err(ReplyError::ResponseNotAck)
        } else if reply.token != self.msg.token {
          Err(ReplyError::TokenMismatch)
        } else {
          Ok(())
        }
      },
      | _ => Err(ReplyError::NotResponse),
    }
  }

  fn complete(&mut self, exchange_lifetime: Millis) {
    self.state = SentState::Completed;
    self.time_due = Milliseconds(self.created.0 + exchange_lifetime.0);
  }

  fn transmit(&mut self, effects: &mut Vec<Effect>) {
    effects.push(Effect::Send(Addrd(self.packed.clone(), self.destination)));
    self.transmissions += 1;
  }
}

#[cfg(test)]
mod tests {
  use newt_msg::{Code, Token};

  use super::*;
  use crate::test::dummy_addr;

  fn con_entry(initial_ms: u64) -> SentEntry {
    let msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    let schedule = RetryTimeout::fixed(Milliseconds(initial_ms), 4);
    SentEntry::new(msg, dummy_addr(), Milliseconds(0), Some(schedule), None)
  }

  // The full no-reply walk from the worked RFC numbers: initial
  // timeout 3 s, transmissions at 0/3/9/21/45 s, final-ACK wait due
  // at MAX_TRANSMIT_WAIT (93 s), completed entry held until
  // EXCHANGE_LIFETIME (247 s), removed on the timeout after that.
  #[test]
  fn con_without_reply_walks_the_whole_lifecycle() {
    let params = TransmissionParameters::default();
    let mut effects = Vec::new();
    let mut entry = con_entry(3_000);

    let expected_dues = [3_000u64, 9_000, 21_000, 45_000, 93_000];
    for (n, expected_due) in expected_dues.iter().enumerate() {
      assert_eq!(entry.process_timeout(&params, &mut effects), Serviced::Rescheduled);
      assert_eq!(entry.transmissions(), n as u16 + 1);
      assert_eq!(entry.time_due(), Milliseconds(*expected_due));
    }

    assert_eq!(entry.state(), SentState::FinalAckWait);
    assert_eq!(entry.time_due(), params.max_transmit_wait());
    assert_eq!(effects.len(), 5);

    assert_eq!(entry.process_timeout(&params, &mut effects), Serviced::Rescheduled);
    assert_eq!(entry.state(), SentState::Completed);
    assert_eq!(entry.time_due(), params.exchange_lifetime());
    assert!(entry.timed_out());

    assert_eq!(entry.process_timeout(&params, &mut effects), Serviced::Dispose);
    assert_eq!(entry.state(), SentState::Removed);
    // no transmissions after the backoff ran dry
    assert_eq!(effects.len(), 5);
  }

  #[test]
  fn non_is_transmitted_once_and_completed() {
    let params = TransmissionParameters::default();
    let mut effects = Vec::new();
    let msg = Message::new(Type::Non, Code::GET, Id(9), Token::default());
    let mut entry = SentEntry::new(msg, dummy_addr(), Milliseconds(1_000), None, None);

    assert_eq!(entry.process_timeout(&params, &mut effects), Serviced::Rescheduled);
    assert_eq!(entry.state(), SentState::Completed);
    assert_eq!(entry.transmissions(), 1);
    assert_eq!(entry.time_due(),
               Milliseconds(1_000 + params.non_lifetime().0));
    assert_eq!(effects.len(), 1);
    assert!(!entry.timed_out());
  }

  #[test]
  fn reply_completes_from_any_backoff_phase() {
    let params = TransmissionParameters::default();
    let mut effects = Vec::new();
    let mut entry = con_entry(3_000);

    entry.process_timeout(&params, &mut effects);
    entry.process_timeout(&params, &mut effects);
    assert_eq!(entry.state(), SentState::Unacknowledged);

    entry.process_reply(Message::reset(Id(1)), params.exchange_lifetime())
         .unwrap();
    assert_eq!(entry.state(), SentState::Completed);
    assert_eq!(entry.time_due(), params.exchange_lifetime());
    assert!(entry.reply().unwrap().is_reset());
    assert!(!entry.timed_out());

    // the scheduled timeout that was pending when the reply arrived
    // now just disposes the entry
    assert_eq!(entry.process_timeout(&params, &mut effects), Serviced::Dispose);
  }

  #[test]
  fn reply_mismatches_are_diagnosed() {
    let params = TransmissionParameters::default();
    let lifetime = params.exchange_lifetime();
    let token = Token::opaque(b"t");
    let msg = Message::new(Type::Con, Code::GET, Id(5), token);
    let mut entry = SentEntry::new(msg,
                                   dummy_addr(),
                                   Milliseconds(0),
                                   Some(RetryTimeout::fixed(Milliseconds(2_000), 4)),
                                   None);

    assert_eq!(entry.process_reply(Message::empty_ack(Id(6)), lifetime),
               Err(ReplyError::IdMismatch { id: Id(6) }));

    // a piggy-backed response must ride an Ack
    let con_response = Message::new(Type::Con, Code::CONTENT, Id(5), token);
    assert_eq!(entry.process_reply(con_response, lifetime),
               Err(ReplyError::ResponseNotAck));

    // a piggy-backed response must echo the request token
    let piggyback = Message::new(Type::Ack, Code::CONTENT, Id(5), Token::default());
    assert_eq!(entry.process_reply(piggyback, lifetime),
               Err(ReplyError::TokenMismatch));

    // an "ACK" carrying a request code is not a reply
    let bogus = Message::new(Type::Ack, Code::GET, Id(5), token);
    assert_eq!(entry.process_reply(bogus, lifetime), Err(ReplyError::NotResponse));

    // and after a good reply, the slot is write-once
    entry.process_reply(Message::new(Type::Ack, Code::CONTENT, Id(5), token), lifetime)
         .unwrap();
    assert_eq!(entry.process_reply(Message::reset(Id(5)), lifetime),
               Err(ReplyError::AlreadyGiven));
  }

  #[test]
  fn stale_at_window() {
    let msg = Message::new(Type::Con, Code::CONTENT, Id(2), Token::default());
    let entry = SentEntry::new(msg,
                               dummy_addr(),
                               Milliseconds(0),
                               Some(RetryTimeout::fixed(Milliseconds(2_000), 4)),
                               Some(Milliseconds(60_000)));
    assert!(!entry.is_stale(Milliseconds(59_999)));
    assert!(entry.is_stale(Milliseconds(60_000)));
  }

  #[test]
  #[should_panic(expected = "already removed")]
  fn servicing_a_removed_entry_panics() {
    let params = TransmissionParameters::default();
    let mut effects = Vec::new();
    let msg = Message::new(Type::Non, Code::GET, Id(3), Token::default());
    let mut entry = SentEntry::new(msg, dummy_addr(), Milliseconds(0), None, None);

    entry.process_timeout(&params, &mut effects);
    assert_eq!(entry.process_timeout(&params, &mut effects), Serviced::Dispose);
    entry.process_timeout(&params, &mut effects);
  }
}
