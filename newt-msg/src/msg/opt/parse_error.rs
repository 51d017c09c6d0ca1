/// Errors encounterable while parsing options from bytes.
///
/// Note what is *not* here: an unknown option number, or a value that
/// violates its registered format, is not a parse error. Those decode
/// to [`OptValue::Unrecognized`](super::OptValue::Unrecognized).
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum OptParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Option delta nibble was 15, which is reserved
  OptionDeltaReservedValue(u8),

  /// Value length nibble was 15, which is reserved
  ValueLengthReservedValue(u8),

  /// Accumulated deltas pushed the option number past 65535
  OptionNumberTooLarge(u32),
}

impl OptParseError {
  /// Shorthand for [`OptParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}
