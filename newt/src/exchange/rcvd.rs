use embedded_time::duration::Milliseconds;
use newt_msg::{CodeKind, Id, Message, Type};
use no_std_net::SocketAddr;

use super::{Effect, ReplyError};
use crate::cache::CacheEntry;
use crate::logging::msg_summary;
use crate::net::Addrd;
use crate::time::Millis;

/// Cache entry for a Con/Non message this endpoint received.
///
/// Its one scheduled event is its own expiry: at `time_due`
/// (EXCHANGE_LIFETIME after a Con, NON_LIFETIME after a Non) the
/// entry leaves the cache and the message ID may be seen as new
/// again. Until then, re-arrivals of the ID are retransmitted
/// duplicates: counted, answered from the cached reply, and never
/// handed to application logic again.
#[derive(Clone, Debug)]
pub struct RcvdEntry {
  msg: Message,
  source: SocketAddr,
  created: Millis,
  time_due: Millis,
  reception_count: u32,
  reply: Option<(Message, Vec<u8>)>,
}

impl CacheEntry for RcvdEntry {
  fn id(&self) -> Id {
    self.msg.id
  }

  fn time_due(&self) -> Millis {
    self.time_due
  }
}

impl RcvdEntry {
  pub(crate) fn new(msg: Message, source: SocketAddr, created: Millis, lifetime: Millis) -> Self {
    RcvdEntry { msg,
                source,
                created,
                time_due: Milliseconds(created.0 + lifetime.0),
                reception_count: 1,
                reply: None }
  }

  /// The received message
  pub fn message(&self) -> &Message {
    &self.msg
  }

  /// Who sent it
  pub fn source(&self) -> SocketAddr {
    self.source
  }

  /// How many times this message has arrived (1 = no duplicates yet)
  pub fn reception_count(&self) -> u32 {
    self.reception_count
  }

  /// The ACK/RST this endpoint chose to send back, once chosen
  pub fn reply(&self) -> Option<&Message> {
    self.reply.as_ref().map(|(msg, _)| msg)
  }

  /// When the entry expires from its cache (absolute ms)
  pub fn time_due(&self) -> Millis {
    self.time_due
  }

  /// When the message first arrived (absolute ms)
  pub fn created(&self) -> Millis {
    self.created
  }

  /// A retransmitted duplicate arrived: bump the counter and, if a
  /// reply was already produced, put it on the wire again.
  /// Application logic is not re-invoked.
  pub(crate) fn duplicate(&mut self, effects: &mut Vec<Effect>) {
    self.reception_count += 1;
    match &self.reply {
      | Some((_, packed)) => {
        log::debug!("{}: received duplicate #{}; retransmitting cached reply",
                    msg_summary(&self.msg),
                    self.reception_count);
        effects.push(Effect::Send(Addrd(packed.clone(), self.source)));
      },
      | None => {
        log::debug!("{}: received duplicate #{}; no reply to retransmit yet",
                    msg_summary(&self.msg),
                    self.reception_count);
      },
    }
  }

  /// Record the ACK/RST answering the received message and transmit
  /// it. Write-once: a second reply is rejected with
  /// [`ReplyError::AlreadyGiven`].
  pub(crate) fn set_reply(&mut self, reply: Message, effects: &mut Vec<Effect>) -> Result<(), ReplyError> {
    self.check_reply(&reply)?;
    let packed = reply.to_bytes();
    effects.push(Effect::Send(Addrd(packed.clone(), self.source)));
    self.reply = Some((reply, packed));
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
}
