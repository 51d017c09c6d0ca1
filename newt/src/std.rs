//! [`Socket`] and [`Clock`](crate::time::Clock) implementations
//! backed by `std`.

use ::std::io;
use ::std::net::UdpSocket;

use embedded_time::rate::Fraction;
use embedded_time::Instant;

use crate::net::{Addrd, Socket};

/// Wall clock counting milliseconds since its creation, backed by
/// [`std::time::Instant`]
#[derive(Debug, Clone, Copy)]
pub struct Clock {
  start: ::std::time::Instant,
}

impl Clock {
  /// A clock whose epoch is now
  pub fn new() -> Self {
    Clock { start: ::std::time::Instant::now() }
  }
}

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000);

  fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
    Ok(Instant::new(self.start.elapsed().as_millis() as u64))
  }
}

pub(crate) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

pub(crate) fn to_std(addr: no_std_net::SocketAddr) -> ::std::net::SocketAddr {
  match addr {
    | no_std_net::SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      ::std::net::SocketAddr::from(([a, b, c, d], v4.port()))
    },
    | no_std_net::SocketAddr::V6(v6) => {
      let ip = ::std::net::Ipv6Addr::from(v6.ip().segments());
      ::std::net::SocketAddr::V6(::std::net::SocketAddrV6::new(ip, v6.port(), 0, 0))
    },
  }
}

pub(crate) fn to_no_std(addr: ::std::net::SocketAddr) -> no_std_net::SocketAddr {
  match addr {
    | ::std::net::SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      let ip = no_std_net::Ipv4Addr::new(a, b, c, d);
      no_std_net::SocketAddr::V4(no_std_net::SocketAddrV4::new(ip, v4.port()))
    },
    | ::std::net::SocketAddr::V6(v6) => {
      let [a, b, c, d, e, f, g, h] = v6.ip().segments();
      let ip = no_std_net::Ipv6Addr::new(a, b, c, d, e, f, g, h);
      no_std_net::SocketAddr::V6(no_std_net::SocketAddrV6::new(ip, v6.port(), 0, 0))
    },
  }
}

impl Socket for UdpSocket {
  type Error = io::Error;

  fn bind(addr: no_std_net::SocketAddr) -> io::Result<Self> {
    let sock = UdpSocket::bind(to_std(addr))?;
    sock.set_nonblocking(true)?;
    Ok(sock)
  }

  fn local_addr(&self) -> no_std_net::SocketAddr {
    to_no_std(UdpSocket::local_addr(self).expect("bound socket has a local address"))
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), io::Error> {
    UdpSocket::send_to(self, msg.data(), to_std(msg.addr())).map(|_| ())
                                                            .map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, io::Error> {
    UdpSocket::recv_from(self, buffer).map(|(n, from)| Addrd(n, to_no_std(from)))
                                      .map_err(io_to_nb)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn addr_conversion_roundtrips() {
    let v4: ::std::net::SocketAddr = "192.0.2.1:5683".parse().unwrap();
    assert_eq!(to_std(to_no_std(v4)), v4);

    let v6: ::std::net::SocketAddr = "[2001:db8::1]:5683".parse().unwrap();
    assert_eq!(to_std(to_no_std(v6)), v6);
  }

  #[test]
  fn would_block_maps_to_nb() {
    let err = io_to_nb(io::Error::from(io::ErrorKind::WouldBlock));
    assert!(matches!(err, nb::Error::WouldBlock));

    let err = io_to_nb(io::Error::from(io::ErrorKind::PermissionDenied));
    assert!(matches!(err, nb::Error::Other(_)));
  }
}
