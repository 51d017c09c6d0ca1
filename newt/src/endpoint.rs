use std::collections::BTreeMap;

use no_std_net::SocketAddr;

/// Transport security mode of an endpoint. DTLS is out of scope, so
/// only [`SecurityMode::NoSec`] exists, but the mode stays part of
/// the interning key: a secured and an unsecured endpoint at one
/// address are different endpoints.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityMode {
  /// Plain UDP
  NoSec,
}

/// Copyable handle to an interned endpoint
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointHandle(usize);

/// Interned map from `(address, security mode)` to
/// [`EndpointHandle`]: the same key always yields the same handle, so
/// handle equality is endpoint identity. Owned by whatever context
/// drives the engine; there is no process-wide registry.
#[derive(Debug, Default)]
pub struct EndpointTable {
  by_key: BTreeMap<(SocketAddr, SecurityMode), EndpointHandle>,
  keys: Vec<(SocketAddr, SecurityMode)>,
}

impl EndpointTable {
  /// An empty table
  pub fn new() -> Self {
    Default::default()
  }

  /// Handle for this key, allocating one on first sight
  pub fn intern(&mut self, addr: SocketAddr, mode: SecurityMode) -> EndpointHandle {
    if let Some(handle) = self.by_key.get(&(addr, mode)) {
      return *handle;
    }
    let handle = EndpointHandle(self.keys.len());
    self.by_key.insert((addr, mode), handle);
    self.keys.push((addr, mode));
    handle
  }

  /// Handle for this key if it was interned before
  pub fn get(&self, addr: SocketAddr, mode: SecurityMode) -> Option<EndpointHandle> {
    self.by_key.get(&(addr, mode)).copied()
  }

  /// The address behind a handle
  pub fn addr(&self, handle: EndpointHandle) -> SocketAddr {
    self.keys[handle.0].0
  }

  /// Number of interned endpoints
  pub fn len(&self) -> usize {
    self.keys.len()
  }

  /// Whether any endpoint has been interned
  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }
}
