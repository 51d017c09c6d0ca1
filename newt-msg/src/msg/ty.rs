/// Message type: Confirmable (0), Non-confirmable (1),
/// Acknowledgement (2) or Reset (3).
///
/// See [RFC7252 §3](https://datatracker.ietf.org/doc/html/rfc7252#section-3)
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug)]
pub enum Type {
  /// Requires an Acknowledgement (or Reset). Retransmitted with
  /// exponential backoff until one arrives.
  Con,
  /// Fire-and-forget; never acknowledged.
  Non,
  /// Acknowledges a specific Confirmable message. May carry a
  /// piggy-backed response.
  Ack,
  /// The received message could not be processed for lack of context
  /// (typically a rebooted peer). Also the reply to a CoAP ping.
  Reset,
}

impl Type {
  /// Decode the 2-bit type field. Total: every 2-bit value is a type.
  pub(crate) fn from_bits(bits: u8) -> Self {
    match bits & 0b11 {
      | 0 => Type::Con,
      | 1 => Type::Non,
      | 2 => Type::Ack,
      | _ => Type::Reset,
    }
  }
}

impl From<Type> for u8 {
  fn from(ty: Type) -> u8 {
    use Type::*;
    match ty {
      | Con => 0,
      | Non => 1,
      | Ack => 2,
      | Reset => 3,
    }
  }
}
