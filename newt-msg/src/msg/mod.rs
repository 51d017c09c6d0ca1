use crate::cursor::Cursor;

/// Message Code
pub mod code;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message parsing errors
pub mod parse_error;

/// Message Token
pub mod token;

/// Message Type
pub mod ty;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

/// Message payload. An empty payload is "absent": it serializes to
/// nothing (no marker byte) and a marker with nothing behind it is a
/// parse error, so `Payload(vec![])` round-trips exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload(pub Vec<u8>);

/// The first byte of a message.
///
/// ```text
/// CoAP version (always 01)
/// |
/// |  Message type
/// |  |
/// |  |  Token length, 0-8
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl From<u8> for Byte1 {
  fn from(b: u8) -> Self {
    Byte1 { ver: Version(b >> 6),
            ty: Type::from_bits(b >> 4),
            tkl: b & 0b1111 }
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    (b.ver.0 << 6) | (u8::from(b.ty) << 4) | b.tkl
  }
}

/// Errors raised by [`Message::validate`]: the message is well-formed
/// bytes-wise but semantically invalid. Never silently corrected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageValidationError {
  /// The code's class has no registered message kind
  CodeUndefined(Code),
  /// The message type cannot carry this kind of code (e.g. a Reset
  /// with a request code, or a Con with the Empty code)
  CodeTypeConflict {
    /// The message's type
    ty: Type,
    /// The offending code
    code: Code,
  },
  /// A 0.00 message carried a token, options or payload
  EmptyMessageNotEmpty,
  /// A request carried Proxy-Uri next to Uri-Host/-Port/-Path/-Query
  ProxyUriConflict,
}

/// # `Message` struct
/// One CoAP PDU, close to the actual byte layout.
///
/// ```
/// use newt_msg::{Code, Id, Message, Opt, Token, Type};
///
/// let mut req = Message::new(Type::Con, Code::GET, Id(0x1234), Token::default());
/// req.opts.push(Opt::uri_path("sensors").unwrap());
/// req.opts.push(Opt::uri_path("temp").unwrap());
///
/// let bytes = req.to_bytes();
/// let parsed = Message::try_from_bytes(&bytes).unwrap().expect("version is 1");
/// assert_eq!(parsed, req);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`Opt`]; canonical order is ascending number, stable for
  /// equal numbers, established by [`Message::validate`]
  pub opts: Vec<Opt>,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// Create a message with no options and no payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Message { id,
              ty,
              ver: Version::default(),
              token,
              code,
              opts: Vec::new(),
              payload: Payload(Vec::new()) }
  }

  /// A bare acknowledgement: type Ack, code 0.00, no token
  pub fn empty_ack(id: Id) -> Self {
    Message::new(Type::Ack, Code::EMPTY, id, Token::default())
  }

  /// A reset: type Reset, code 0.00, no token
  pub fn reset(id: Id) -> Self {
    Message::new(Type::Reset, Code::EMPTY, id, Token::default())
  }

  /// Is this a Reset message?
  pub fn is_reset(&self) -> bool {
    self.ty == Type::Reset
  }

  /// Is this an acknowledgement (bare or piggy-backing a response)?
  pub fn is_ack(&self) -> bool {
    self.ty == Type::Ack
  }

  /// First option with the given number, if any
  pub fn option(&self, number: OptNumber) -> Option<&Opt> {
    self.opts.iter().find(|opt| opt.number() == number)
  }

  /// Serialize to the RFC 7252 §3 wire form
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + self.token.0.len() + self.payload.0.len() + 16);

    bytes.push(u8::from(Byte1 { ver: self.ver,
                                ty: self.ty,
                                tkl: self.token.0.len() as u8 }));
    bytes.push(u8::from(self.code));
    bytes.extend_from_slice(&<[u8; 2]>::from(self.id));
    bytes.extend_from_slice(&self.token.0);
    bytes.extend_from_slice(&opt::encode_options(&self.opts));

    if !self.payload.0.is_empty() {
      bytes.push(0xFF);
      bytes.extend_from_slice(&self.payload.0);
    }

    bytes
  }

  /// Parse a datagram.
  ///
  /// `Ok(None)` means the version field was not 1: RFC 7252 §3 says
  /// such datagrams are silently ignored, so this is not an error and
  /// produces no diagnostic.
  ///
  /// ```
  /// use newt_msg::Message;
  ///
  /// // version bits 10: some other protocol's traffic, not ours
  /// assert_eq!(Message::try_from_bytes(b"\x80"), Ok(None));
  /// ```
  pub fn try_from_bytes<B: AsRef<[u8]>>(bytes: B) -> Result<Option<Self>, MessageParseError> {
    let data = bytes.as_ref();
    let mut bytes = Cursor::new(data);

    let byte1 = Byte1::from(bytes.next().ok_or_else(MessageParseError::eof)?);
    if byte1.ver != Version(1) {
      return Ok(None);
    }

    let code = Code::from(bytes.next().ok_or_else(MessageParseError::eof)?);
    let id = match bytes.take_exact(2) {
      | Some(&[a, b]) => Id::from_be_bytes([a, b]),
      | _ => return Err(MessageParseError::eof()),
    };

    let header = ParsedHeader { ty: byte1.ty,
                                code,
                                id };
    let fail = |reason| MessageParseError { reason,
                                            header: Some(header) };

    if code.kind().is_none() {
      return Err(fail(ParseErrorReason::UnrecognizedCodeClass(code.class)));
    }
    if byte1.tkl > 8 {
      return Err(fail(ParseErrorReason::InvalidTokenLength(byte1.tkl)));
    }
    if code == Code::EMPTY && (byte1.tkl != 0 || bytes.remaining() > 0) {
      return Err(fail(ParseErrorReason::EmptyMessageNotEmpty));
    }

    let token = bytes.take_exact(byte1.tkl as usize)
                     .ok_or_else(|| fail(ParseErrorReason::UnexpectedEndOfStream))?;
    let token = Token(tinyvec::ArrayVec::<[u8; 8]>::try_from(token).expect("tkl was checked to be <= 8"));

    let (opts, remainder) =
      opt::decode_options(bytes.take_until_end()).map_err(|e| fail(ParseErrorReason::OptParseError(e)))?;

    let payload = match remainder {
      | [] => Payload(Vec::new()),
      | [0xFF] => return Err(fail(ParseErrorReason::ZeroLengthPayload)),
      | [0xFF, rest @ ..] => Payload(rest.to_vec()),
      // decode_options stops only at the marker or end of input
      | _ => unreachable!("option decoding left a remainder not starting with 0xFF"),
    };

    Ok(Some(Message { id,
                      ty: byte1.ty,
                      ver: byte1.ver,
                      token,
                      code,
                      opts,
                      payload }))
  }

  /// Enforce the semantic invariants a well-formed message must hold,
  /// rewriting `opts` into canonical form on the way:
  ///
  /// - the code's kind must exist and agree with the message type
  ///   (Con/Non carry requests or responses; Ack carries Empty or a
  ///   response; Reset carries only Empty);
  /// - a 0.00 message is exactly a header;
  /// - options get [`opt::replace_unacceptable_options`] applied,
  ///   then canonical sorting;
  /// - a request may not carry Proxy-Uri next to any of
  ///   Uri-Host/Uri-Port/Uri-Path/Uri-Query.
  ///
  /// Options still unrecognized afterwards are a diagnostic, never an
  /// error.
  pub fn validate(&mut self) -> Result<(), MessageValidationError> {
    let kind = self.code
                   .kind()
                   .ok_or(MessageValidationError::CodeUndefined(self.code))?;

    let agree = match self.ty {
      | Type::Con | Type::Non => kind == CodeKind::Request || kind.is_response(),
      | Type::Ack => kind == CodeKind::Empty || kind.is_response(),
      | Type::Reset => kind == CodeKind::Empty,
    };
    if !agree {
      return Err(MessageValidationError::CodeTypeConflict { ty: self.ty,
                                                            code: self.code });
    }

    if kind == CodeKind::Empty
       && (!self.token.0.is_empty() || !self.opts.is_empty() || !self.payload.0.is_empty())
    {
      return Err(MessageValidationError::EmptyMessageNotEmpty);
    }

    let is_request = kind == CodeKind::Request;
    opt::replace_unacceptable_options(&mut self.opts, is_request);

    if is_request && self.has_recognized(known::PROXY_URI.num()) {
      let uri_parts = [known::URI_HOST, known::URI_PORT, known::URI_PATH, known::URI_QUERY];
      if uri_parts.iter().any(|def| self.has_recognized(def.num())) {
        return Err(MessageValidationError::ProxyUriConflict);
      }
    }

    for opt in self.opts.iter().filter(|opt| opt.is_unrecognized()) {
      log::debug!("option {} not recognized; carrying it opaquely", opt.number().0);
    }

    Ok(())
  }

  fn has_recognized(&self, number: OptNumber) -> bool {
    self.opts
        .iter()
        .any(|opt| opt.number() == number && !opt.is_unrecognized())
  }
}
