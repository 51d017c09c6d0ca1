use newt_msg::Message;

pub(crate) fn msg_summary(msg: &Message) -> String {
  format!("{:?} {} (id {}) with {}B payload",
          msg.ty,
          msg.code.to_human(),
          msg.id.0,
          msg.payload.0.len())
}

#[cfg(test)]
mod tests {
  use newt_msg::{Code, Id, Message, Token, Type};

  use super::*;

  #[test]
  fn summary_reads_like_a_log_line() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(7), Token::default());
    msg.payload = newt_msg::Payload(vec![0; 4]);
    assert_eq!(msg_summary(&msg), "Con 0.01 GET (id 7) with 4B payload");
  }
}
