use no_std_net::SocketAddr;

/// The IANA-assigned default port for unsecured CoAP ("coap" URIs)
pub const COAP_PORT: u16 = 5683;

/// The IANA-assigned default port for secured CoAP ("coaps" URIs)
pub const COAPS_PORT: u16 = 5684;

/// Data paired with the network address it came from or is going to
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the address and take the data
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data, keeping the address
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the data
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the data
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the address
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

/// A non-blocking UDP-shaped socket.
///
/// This is the engine's whole view of the network: the reliability
/// machinery never touches a socket itself (it emits
/// [`Effect`](crate::exchange::Effect)s), so the driver can back this
/// with a real socket, a DTLS wrapper, or an in-memory loopback for
/// tests.
pub trait Socket: Sized {
  /// The error yielded by socket operations
  type Error: core::fmt::Debug;

  /// Bind a non-blocking socket to `addr`
  fn bind(addr: SocketAddr) -> Result<Self, Self::Error>;

  /// The local address this socket is bound to
  fn local_addr(&self) -> SocketAddr;

  /// Send one datagram to a remote address
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull one buffered datagram, with the sender's address.
  /// [`nb::Error::WouldBlock`] when nothing is queued; bytes beyond
  /// the buffer's length are dropped, as with
  /// [`std::net::UdpSocket`].
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Poll for one datagram, `None` if nothing is queued.
  ///
  /// The default implementation reads into a buffer sized to the RFC
  /// 7252 §4.6 datagram budget (1152 bytes).
  fn poll(&self) -> Result<Option<Addrd<Vec<u8>>>, Self::Error> {
    let mut buffer = vec![0u8; 1152];
    match self.recv(&mut buffer) {
      | Ok(Addrd(n, addr)) => {
        buffer.truncate(n);
        Ok(Some(Addrd(buffer, addr)))
      },
      | Err(nb::Error::WouldBlock) => Ok(None),
      | Err(nb::Error::Other(e)) => Err(e),
    }
  }
}
