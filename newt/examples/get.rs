//! Minimal blocking CoAP GET client.
//!
//! ```sh
//! cargo run --example get -- 192.0.2.1:5683 sensors/temp
//! ```
//!
//! Drives one confirmable exchange end to end: queue the request,
//! flush the engine's effects to a real socket, feed replies back,
//! and report either the response or retransmission exhaustion.

use std::net::UdpSocket;
use std::time::Duration;

use embedded_time::Clock as _;
use newt::config::TransmissionParameters;
use newt::exchange::{Effect, Exchanges, SentState};
use newt::net::Socket;
use newt_msg::{Code, Id, Message, Opt, Token, Type};

fn no_std_addr(addr: std::net::SocketAddr) -> no_std_net::SocketAddr {
  match addr {
    | std::net::SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      no_std_net::SocketAddr::V4(no_std_net::SocketAddrV4::new(no_std_net::Ipv4Addr::new(a, b, c, d),
                                                              v4.port()))
    },
    | std::net::SocketAddr::V6(v6) => {
      let [a, b, c, d, e, f, g, h] = v6.ip().segments();
      no_std_net::SocketAddr::V6(no_std_net::SocketAddrV6::new(no_std_net::Ipv6Addr::new(a, b, c, d,
                                                                                        e, f, g, h),
                                                              v6.port(),
                                                              0,
                                                              0))
    },
  }
}

fn main() {
  let mut args = std::env::args().skip(1);
  let dest: std::net::SocketAddr = args.next()
                                       .expect("usage: get <addr> <path>")
                                       .parse()
                                       .expect("a socket address");
  let path = args.next().unwrap_or_else(|| ".well-known/core".to_owned());
  let dest = no_std_addr(dest);

  let sock = <UdpSocket as Socket>::bind(no_std_addr("0.0.0.0:0".parse().unwrap())).expect("bind");
  let clock = newt::std::Clock::new();
  let mut exchanges = Exchanges::new(TransmissionParameters::default());
  let mut effects = Vec::new();

  let mut req = Message::new(Type::Con, Code::GET, Id(0), Token::opaque(b"get-example"));
  for segment in path.split('/').filter(|s| !s.is_empty()) {
    req.opts.push(Opt::uri_path(segment).expect("path segment fits in an option"));
  }

  let id = exchanges.send(req, dest, clock.try_now().unwrap())
                    .expect("request is valid");

  loop {
    exchanges.service(clock.try_now().unwrap(), &mut effects);
    for effect in effects.drain(..) {
      let Effect::Send(dgram) = effect;
      nb::block!(Socket::send(&sock, dgram.as_ref().map(|bytes| bytes.as_slice()))).expect("send");
    }

    if let Some(dgram) = sock.poll().expect("recv") {
      match Message::try_from_bytes(dgram.data()) {
        | Ok(Some(msg)) if msg.ty == Type::Ack || msg.ty == Type::Reset => {
          exchanges.process_reply(&msg, dgram.addr()).ok();
        },
        | Ok(Some(_)) | Ok(None) => {},
        | Err(e) => eprintln!("malformed datagram: {:?}", e),
      }
    }

    let entry = exchanges.sent_entry(dest, id)
                         .expect("the entry outlives this loop");
    match (entry.state(), entry.reply()) {
      | (_, Some(reply)) => {
        println!("{}: {}",
                 reply.code.to_human(),
                 String::from_utf8_lossy(&reply.payload.0));
        break;
      },
      | (SentState::Completed, None) => {
        eprintln!("no reply after {} transmissions", entry.transmissions());
        std::process::exit(1);
      },
      | _ => std::thread::sleep(Duration::from_millis(20)),
    }
  }
}
