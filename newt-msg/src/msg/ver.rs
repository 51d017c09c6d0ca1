/// Version of the CoAP protocol the message adheres to.
///
/// Always 1 for messages this crate produces. Inbound datagrams with
/// any other version are silently ignored per RFC 7252 §3.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}
