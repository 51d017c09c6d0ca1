#[allow(unused_imports)]
use crate::Token;

/// # Message ID
///
/// 16-bit unsigned integer in network byte order. Used to detect
/// message duplication and to match Acknowledgement/Reset messages to
/// the Confirmable/Non-confirmable message they answer. Within one
/// endpoint/direction, an ID stays reserved for the exchange lifetime
/// of the message that used it.
///
/// For the difference between [`Id`] and [`Token`], see [`Token`].
///
/// See [RFC7252 §4](https://datatracker.ietf.org/doc/html/rfc7252#section-4)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Id(pub u16);

impl Id {
  /// Create an Id from a big-endian 2-byte unsigned int
  pub fn from_be_bytes(bytes: [u8; 2]) -> Self {
    Self(u16::from_be_bytes(bytes))
  }
}

impl From<Id> for [u8; 2] {
  fn from(id: Id) -> [u8; 2] {
    id.0.to_be_bytes()
  }
}
