use tinyvec::ArrayVec;

use crate::cursor::Cursor;

pub mod known;

/// Option parsing errors
pub mod parse_error;

/// Typed option values & formats
pub mod value;

pub use parse_error::*;
pub use value::*;

use known::{OptDef, Occurs};

/// # Option Number
///
/// Identifies which option an instance is (e.g. Uri-Path is number
/// 11). On the wire, numbers are not stored directly; each option
/// encodes the *delta* to the previous option's number, which is why
/// options must be sorted before encoding.
///
/// See [RFC7252 §5.4.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.4.6)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u16);

impl OptNumber {
  /// Whether a server may ignore this option (RFC 7252 §5.4.1).
  /// Critical options have an odd number.
  pub fn is_critical(&self) -> bool {
    self.0 & 0b1 == 1
  }

  /// Whether a proxy that does not understand this option may forward
  /// it blindly (RFC 7252 §5.4.2)
  pub fn is_safe_to_forward(&self) -> bool {
    self.0 & 0b10 == 0
  }
}

/// One option instance: a number plus a typed value.
///
/// The only ways to build one are [`Opt::known`] (validated against
/// the registered descriptor on every construction and assignment,
/// not just at decode) and [`Opt::unrecognized`] (raw bytes, valid
/// anywhere).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opt {
  number: OptNumber,
  value: OptValue,
}

impl Opt {
  /// Typed option for a registered number.
  ///
  /// ```
  /// use newt_msg::opt::{known, Opt, OptValue};
  ///
  /// let port = Opt::known(known::URI_PORT.num(), OptValue::Uint(5683)).unwrap();
  /// assert_eq!(port.name(), "Uri-Port");
  ///
  /// // value bounds are enforced here, not at encode time
  /// assert!(Opt::known(known::URI_HOST.num(), OptValue::String("".into())).is_err());
  /// ```
  pub fn known(number: OptNumber, value: OptValue) -> Result<Self, OptValueError> {
    let def = known::find(number.0).ok_or(OptValueError::UnknownNumber(number.0))?;
    if matches!(value, OptValue::Unrecognized(_)) {
      return Err(OptValueError::WrongFormat);
    }
    def.format.to_packed(&value)?;
    Ok(Opt { number, value })
  }

  /// An option this endpoint does not recognize, kept as raw bytes.
  /// Valid for any number, in any position, at any cardinality.
  pub fn unrecognized(number: OptNumber, raw: Vec<u8>) -> Self {
    Opt { number,
          value: OptValue::Unrecognized(raw) }
  }

  /// The option's number
  pub fn number(&self) -> OptNumber {
    self.number
  }

  /// The option's value
  pub fn value(&self) -> &OptValue {
    &self.value
  }

  /// Replace the value, re-validating against the descriptor
  pub fn set_value(&mut self, value: OptValue) -> Result<(), OptValueError> {
    if let OptValue::Unrecognized(_) = value {
      self.value = value;
      return Ok(());
    }
    *self = Self::known(self.number, value)?;
    Ok(())
  }

  /// Diagnostic name from the registry, or `"Unrecognized"`
  pub fn name(&self) -> &'static str {
    match (&self.value, known::find(self.number.0)) {
      | (OptValue::Unrecognized(_), _) | (_, None) => "Unrecognized",
      | (_, Some(def)) => def.name,
    }
  }

  /// Whether the value is carried as unrecognized raw bytes
  pub fn is_unrecognized(&self) -> bool {
    matches!(self.value, OptValue::Unrecognized(_))
  }

  /// The value's packed wire form
  pub fn to_packed(&self) -> Vec<u8> {
    match &self.value {
      | OptValue::Unrecognized(raw) => raw.clone(),
      | value => {
        known::find(self.number.0).expect("typed values exist only for registered numbers")
                                  .format
                                  .to_packed(value)
                                  .expect("typed values are validated on construction")
      },
    }
  }

  fn def(&self) -> Option<&'static OptDef> {
    if self.is_unrecognized() {
      None
    } else {
      known::find(self.number.0)
    }
  }
}

macro_rules! ctor {
  (#[doc = $doc:expr] $name:ident(str) = $def:expr) => {
    #[doc = $doc]
    pub fn $name<S: AsRef<str>>(value: S) -> Result<Opt, OptValueError> {
      Opt::known($def.num(), OptValue::String(value.as_ref().to_owned()))
    }
  };
  (#[doc = $doc:expr] $name:ident(uint) = $def:expr) => {
    #[doc = $doc]
    pub fn $name(value: u64) -> Result<Opt, OptValueError> {
      Opt::known($def.num(), OptValue::Uint(value))
    }
  };
  (#[doc = $doc:expr] $name:ident(opaque) = $def:expr) => {
    #[doc = $doc]
    pub fn $name(value: &[u8]) -> Result<Opt, OptValueError> {
      Opt::known($def.num(), OptValue::Opaque(value.to_vec()))
    }
  };
}

impl Opt {
  ctor!(#[doc = "If-Match"] if_match(opaque) = known::IF_MATCH);
  ctor!(#[doc = "Uri-Host"] uri_host(str) = known::URI_HOST);
  ctor!(#[doc = "ETag"] etag(opaque) = known::ETAG);
  ctor!(#[doc = "Uri-Port"] uri_port(uint) = known::URI_PORT);
  ctor!(#[doc = "Location-Path (one segment)"] location_path(str) = known::LOCATION_PATH);
  ctor!(#[doc = "Uri-Path (one segment)"] uri_path(str) = known::URI_PATH);
  ctor!(#[doc = "Content-Format"] content_format(uint) = known::CONTENT_FORMAT);
  ctor!(#[doc = "Max-Age, in seconds"] max_age(uint) = known::MAX_AGE);
  ctor!(#[doc = "Uri-Query (one `&`-separated element)"] uri_query(str) = known::URI_QUERY);
  ctor!(#[doc = "Accept"] accept(uint) = known::ACCEPT);
  ctor!(#[doc = "Location-Query (one element)"] location_query(str) = known::LOCATION_QUERY);
  ctor!(#[doc = "Proxy-Uri"] proxy_uri(str) = known::PROXY_URI);
  ctor!(#[doc = "Proxy-Scheme"] proxy_scheme(str) = known::PROXY_SCHEME);
  ctor!(#[doc = "Size1, in bytes"] size1(uint) = known::SIZE1);

  /// If-None-Match
  pub fn if_none_match() -> Opt {
    Opt::known(known::IF_NONE_MATCH.num(), OptValue::Empty).expect("If-None-Match is empty-format")
  }
}

/// Encode a value for the 4-bit-plus-extension scheme shared by the
/// option delta and option length fields: 0-12 go in the nibble
/// directly; 13-268 set nibble 13 with one extension byte holding
/// `value - 13`; larger values set nibble 14 with two extension bytes
/// holding `value - 269`. Nibble 15 is never produced (reserved: it
/// signals the payload marker in the containing message).
pub fn encode_len_or_delta(value: u16) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match value {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend((n - 269).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n - 13) as u8);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

/// Decode one delta-or-length field given its nibble, consuming any
/// extension bytes from the cursor. `reserved_err` is returned for
/// nibble 15, which differs by position (delta vs length).
pub fn parse_len_or_delta<A: AsRef<[u8]>>(nibble: u8,
                                          bytes: &mut Cursor<A>,
                                          reserved_err: OptParseError)
                                          -> Result<u32, OptParseError> {
  match nibble {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok(u32::from(n) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u32::from(u16::from_be_bytes([a, b])) + 269),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(u32::from(nibble)),
  }
}

/// Stable-sort options by ascending number: the canonical order
/// required before encoding and before cardinality checks. Options
/// with equal numbers keep their relative order (it is significant,
/// e.g. Uri-Path segments).
pub fn sort_options(opts: &mut [Opt]) {
  opts.sort_by_key(|opt| opt.number());
}

/// Downgrade options that are not acceptable for the message kind:
/// any option disallowed in this kind, and second-and-later
/// occurrences of single-occurrence options, become
/// [`Opt::unrecognized`] carrying the same number and packed bytes.
///
/// This is the semantic reclassification RFC 7252 §5.4.5 requires,
/// not an error; processing continues with the option treated as
/// unknown. Sorts the options as a side effect (repeats must be
/// adjacent to be counted).
pub fn replace_unacceptable_options(opts: &mut [Opt], is_request: bool) {
  sort_options(opts);

  let mut last: Option<u16> = None;
  for opt in opts.iter_mut() {
    let number = opt.number().0;
    let repeated = last == Some(number);
    last = Some(number);

    let def = match opt.def() {
      | Some(def) => def,
      | None => continue,
    };

    let downgrade = match def.occurs_in(is_request) {
      | Occurs::Never => true,
      | Occurs::Once => repeated,
      | Occurs::Many => false,
    };

    if downgrade {
      log::debug!("downgrading {} ({}): unacceptable in this message", def.name, number);
      *opt = Opt::unrecognized(OptNumber(number), opt.to_packed());
    }
  }
}

/// Encode options to their wire form: sorted, then one
/// `(delta, length, value)` record per option. The running number
/// advances by each emitted option's *number*, so repeated numbers
/// encode a delta of zero.
pub fn encode_options(opts: &[Opt]) -> Vec<u8> {
  let mut sorted: Vec<&Opt> = opts.iter().collect();
  sorted.sort_by_key(|opt| opt.number());

  let mut bytes = Vec::new();
  let mut last: u16 = 0;
  for opt in sorted {
    let value = opt.to_packed();
    let length = u16::try_from(value.len()).expect("option values longer than 65535 bytes are not encodable");
    let (delta_nibble, delta_ext) = encode_len_or_delta(opt.number().0 - last);
    let (len_nibble, len_ext) = encode_len_or_delta(length);

    bytes.push((delta_nibble << 4) | len_nibble);
    if let Some(ext) = delta_ext {
      bytes.extend(ext);
    }
    if let Some(ext) = len_ext {
      bytes.extend(ext);
    }
    bytes.extend(value);

    last = opt.number().0;
  }
  bytes
}

/// Decode options from `data`, stopping at the payload marker (0xFF,
/// left unconsumed) or the end of input. Returns the options and the
/// remainder, which is either empty or begins with the marker.
///
/// Unknown numbers and registered numbers whose value violates the
/// descriptor both come back as [`Opt::unrecognized`]; only
/// structural damage (reserved nibbles, truncation, a number past
/// 65535) is an error.
pub fn decode_options(data: &[u8]) -> Result<(Vec<Opt>, &[u8]), OptParseError> {
  let mut bytes = Cursor::new(data);
  let mut opts = Vec::new();
  let mut number: u32 = 0;

  loop {
    match bytes.peek() {
      | None | Some(0xFF) => break,
      | Some(_) => {},
    }

    let byte1 = bytes.next().expect("peeked Some above");
    // delta must be consumed before length: its extension bytes come first
    let delta = parse_len_or_delta(byte1 >> 4,
                                   &mut bytes,
                                   OptParseError::OptionDeltaReservedValue(15))?;
    let length = parse_len_or_delta(byte1 & 0b1111,
                                    &mut bytes,
                                    OptParseError::ValueLengthReservedValue(15))?;

    number += delta;
    if number > u32::from(u16::MAX) {
      return Err(OptParseError::OptionNumberTooLarge(number));
    }

    let raw = bytes.take_exact(length as usize)
                   .ok_or_else(OptParseError::eof)?
                   .to_vec();
    opts.push(decode_one(OptNumber(number as u16), raw));
  }

  Ok((opts, &data[bytes.position()..]))
}

fn decode_one(number: OptNumber, raw: Vec<u8>) -> Opt {
  match known::find(number.0) {
    | Some(def) => match def.format.from_packed(&raw) {
      | Ok(value) => Opt { number, value },
      | Err(e) => {
        log::debug!("{} value rejected ({:?}); carrying it unrecognized", def.name, e);
        Opt::unrecognized(number, raw)
      },
    },
    | None => Opt::unrecognized(number, raw),
  }
}
