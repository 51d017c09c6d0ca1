use unicode_normalization::UnicodeNormalization;

/// Value format of a registered option, with bounds (inclusive) on
/// the *packed* byte length.
///
/// See [RFC7252 §3.2](https://datatracker.ietf.org/doc/html/rfc7252#section-3.2)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
  /// Zero bytes of value; presence is the whole message
  Empty,
  /// Raw bytes
  Opaque {
    /// Minimum packed length
    min: usize,
    /// Maximum packed length
    max: usize,
  },
  /// Non-negative integer, packed as the shortest big-endian byte
  /// sequence with no leading zero byte (0 packs to zero bytes)
  Uint {
    /// Minimum packed length
    min: usize,
    /// Maximum packed length
    max: usize,
  },
  /// Net-Unicode text (RFC 5198): NFC-normalized, UTF-8 encoded.
  /// Bounds apply to the encoded bytes, not code points.
  String {
    /// Minimum packed length
    min: usize,
    /// Maximum packed length
    max: usize,
  },
}

/// Why a value could not be packed or unpacked
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptValueError {
  /// Packed length fell outside the format's bounds
  LengthOutOfBounds {
    /// Minimum allowed
    min: usize,
    /// Maximum allowed
    max: usize,
    /// What the value packs to
    actual: usize,
  },
  /// The value's variant does not match the option's format
  WrongFormat,
  /// String-format bytes were not valid UTF-8
  NotUtf8,
  /// No descriptor is registered for this option number
  UnknownNumber(u16),
}

impl Format {
  /// The format's packed-length bounds, `(min, max)` inclusive
  pub fn bounds(&self) -> (usize, usize) {
    match *self {
      | Format::Empty => (0, 0),
      | Format::Opaque { min, max }
      | Format::Uint { min, max }
      | Format::String { min, max } => (min, max),
    }
  }

  /// Check a packed length against the bounds
  pub fn check_length(&self, actual: usize) -> Result<(), OptValueError> {
    let (min, max) = self.bounds();
    if actual < min || actual > max {
      Err(OptValueError::LengthOutOfBounds { min, max, actual })
    } else {
      Ok(())
    }
  }

  /// Pack a typed value, validating its variant and packed length.
  ///
  /// ```
  /// use newt_msg::{Format, OptValue};
  ///
  /// let uint = Format::Uint { min: 0, max: 2 };
  /// assert_eq!(uint.to_packed(&OptValue::Uint(0x0114)), Ok(vec![0x01, 0x14]));
  /// assert_eq!(uint.to_packed(&OptValue::Uint(0)), Ok(vec![]));
  /// assert!(uint.to_packed(&OptValue::Uint(0x1_0000)).is_err());
  /// ```
  pub fn to_packed(&self, value: &OptValue) -> Result<Vec<u8>, OptValueError> {
    let packed = match (self, value) {
      | (Format::Empty, OptValue::Empty) => Vec::new(),
      | (Format::Opaque { .. }, OptValue::Opaque(bytes)) => bytes.clone(),
      | (Format::Uint { .. }, OptValue::Uint(n)) => pack_uint(*n),
      | (Format::String { .. }, OptValue::String(s)) => {
        s.nfc().collect::<String>().into_bytes()
      },
      | _ => return Err(OptValueError::WrongFormat),
    };
    self.check_length(packed.len())?;
    Ok(packed)
  }

  /// Unpack bytes into a typed value. Length is validated before any
  /// format-specific decoding; leading zero bytes on a uint are legal.
  pub fn from_packed(&self, bytes: &[u8]) -> Result<OptValue, OptValueError> {
    self.check_length(bytes.len())?;
    match self {
      | Format::Empty => Ok(OptValue::Empty),
      | Format::Opaque { .. } => Ok(OptValue::Opaque(bytes.to_vec())),
      | Format::Uint { .. } => Ok(OptValue::Uint(unpack_uint(bytes))),
      | Format::String { .. } => {
        core::str::from_utf8(bytes).map(|s| OptValue::String(s.to_owned()))
                                   .map_err(|_| OptValueError::NotUtf8)
      },
    }
  }
}

/// Typed value of one option instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptValue {
  /// No value
  Empty,
  /// Raw bytes
  Opaque(Vec<u8>),
  /// Unsigned integer
  Uint(u64),
  /// Net-Unicode text
  String(String),
  /// Raw bytes of an option this endpoint does not recognize (either
  /// an unregistered number, or a registered one whose value violated
  /// its descriptor). Structurally valid in any position and
  /// cardinality.
  Unrecognized(Vec<u8>),
}

fn pack_uint(value: u64) -> Vec<u8> {
  let bytes = value.to_be_bytes();
  let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
  bytes[first..].to_vec()
}

fn unpack_uint(bytes: &[u8]) -> u64 {
  // registered uint formats cap out at 4 bytes; 8 fits regardless
  debug_assert!(bytes.len() <= 8);
  bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}
