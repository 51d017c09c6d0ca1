//! One whole confirmable exchange, driven end to end over the public
//! surface: client sends a CON GET, server dedups and answers with a
//! piggy-backed ACK, client correlates the reply and stops
//! retransmitting.

use embedded_time::rate::Fraction;
use embedded_time::Instant;
use newt::config::TransmissionParameters;
use newt::exchange::{Effect, Exchanges, Receipt, SentState};
use newt_msg::{Code, Id, Message, Payload, Token, Type};
use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Instants are built directly with [`at`]; the clock type exists to
/// parameterize them with a millisecond tick.
#[derive(Debug)]
struct StepClock;

impl embedded_time::Clock for StepClock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000);

  fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
    Ok(Instant::new(0))
  }
}

fn at(ms: u64) -> Instant<StepClock> {
  Instant::new(ms)
}

fn addr(host: u8) -> SocketAddr {
  SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, host), 5683))
}

fn sent(effects: &[Effect]) -> Vec<&[u8]> {
  effects.iter()
         .map(|effect| {
           let Effect::Send(addrd) = effect;
           addrd.data().as_slice()
         })
         .collect()
}

#[test]
fn piggy_backed_exchange() {
  let client_addr = addr(1);
  let server_addr = addr(2);

  let mut client = Exchanges::new(TransmissionParameters::default());
  let mut server = Exchanges::new(TransmissionParameters::default());
  let mut client_out = Vec::new();
  let mut server_out = Vec::new();

  // client queues a GET and puts it on the wire
  let token = Token::opaque(b"exchange-1");
  let mut req = Message::new(Type::Con, Code::GET, Id(0), token);
  req.opts.push(newt_msg::Opt::uri_path("sensors").unwrap());
  req.opts.push(newt_msg::Opt::uri_path("temp").unwrap());
  let req_id = client.send(req, server_addr, at(0)).unwrap();
  client.service(at(0), &mut client_out);
  assert_eq!(client_out.len(), 1);

  // the wire delivers it twice (duplicated datagram)
  let datagram = sent(&client_out)[0].to_vec();
  let rcvd = Message::try_from_bytes(&datagram).unwrap().expect("version 1");
  assert_eq!(server.received(&rcvd, client_addr, at(10), &mut server_out),
             Receipt::New);
  assert_eq!(server.received(&rcvd, client_addr, at(12), &mut server_out),
             Receipt::Duplicate { reception_count: 2 });
  // no reply yet, so the duplicate got nothing
  assert!(server_out.is_empty());

  // server answers with a piggy-backed response
  let mut response = Message::new(Type::Ack, Code::CONTENT, rcvd.id, rcvd.token);
  response.payload = Payload(b"21.5 C".to_vec());
  server.reply(client_addr, rcvd.id, false, Some(response), &mut server_out)
        .unwrap();
  assert_eq!(server_out.len(), 1);

  // a third duplicate is answered from the cached reply, not the app
  assert_eq!(server.received(&rcvd, client_addr, at(20), &mut server_out),
             Receipt::Duplicate { reception_count: 3 });
  assert_eq!(server_out.len(), 2);
  assert_eq!(sent(&server_out)[0], sent(&server_out)[1]);

  // client takes the ACK and completes the exchange
  let ack_bytes = sent(&server_out)[0].to_vec();
  let ack = Message::try_from_bytes(&ack_bytes).unwrap().expect("version 1");
  assert!(ack.is_ack());
  assert_eq!(ack.token, token);
  client.process_reply(&ack, server_addr).unwrap();

  let entry = client.sent_entry(server_addr, req_id).unwrap();
  assert_eq!(entry.state(), SentState::Completed);
  assert_eq!(entry.reply().unwrap().payload.0, b"21.5 C".to_vec());

  // nothing further is ever retransmitted, and the ID is held until
  // EXCHANGE_LIFETIME before it leaves the cache
  client.service(at(100_000), &mut client_out);
  assert_eq!(client_out.len(), 1);
  client.service(at(247_000), &mut client_out);
  assert!(client.sent_entry(server_addr, req_id).is_none());
}

#[test]
fn separate_reset_exchange() {
  let server_addr = addr(2);
  let mut client = Exchanges::new(TransmissionParameters::default());
  let mut out = Vec::new();

  let req = Message::new(Type::Con, Code::GET, Id(0), Token::opaque(b"exchange-2"));
  let req_id = client.send(req, server_addr, at(0)).unwrap();

  // first transmission, then one retransmission before the peer
  // finally answers with a Reset
  client.service(at(0), &mut out);
  let first_retransmit_due = client.sent_entry(server_addr, req_id).unwrap().time_due();
  client.service(at(first_retransmit_due.0), &mut out);
  assert_eq!(out.len(), 2);
  assert_eq!(client.sent_entry(server_addr, req_id).unwrap().transmissions(), 2);

  client.process_reply(&Message::reset(req_id), server_addr).unwrap();
  let entry = client.sent_entry(server_addr, req_id).unwrap();
  assert_eq!(entry.state(), SentState::Completed);
  assert!(entry.reply().unwrap().is_reset());
  assert!(!entry.timed_out());

  // the pending retransmission timer fires into the completed state
  // and is a no-op until eviction
  let due = entry.time_due();
  client.service(at(due.0), &mut out);
  assert_eq!(out.len(), 2);
  assert!(client.sent_entry(server_addr, req_id).is_none());
}
