use super::code::Code;
use super::id::Id;
use super::opt::parse_error::OptParseError;
use super::ty::Type;

/// Header fields recovered before a parse failure.
///
/// RFC 7252 §4.2/§4.3 prescribe the receiver's reaction to a malformed
/// message by its type (MUST Reset a Con, MAY Reset a Non, MUST NOT
/// react to Ack/Reset), and the Reset must echo the message ID. That
/// reaction is the endpoint layer's call; this struct gives it the
/// material.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParsedHeader {
  /// Message type from the first byte
  pub ty: Type,
  /// Message code, possibly of an unregistered class
  pub code: Code,
  /// Message ID
  pub id: Id,
}

/// What went wrong while parsing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorReason {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Token length nibble was > 8
  InvalidTokenLength(u8),

  /// Error parsing options
  OptParseError(OptParseError),

  /// A payload marker (0xFF) with nothing after it
  ZeroLengthPayload,

  /// Code classes 1, 6 and 7 have no registered message kind
  UnrecognizedCodeClass(u8),

  /// A 0.00 message must be exactly the 4-byte header
  EmptyMessageNotEmpty,
}

/// Errors encounterable while parsing a message from bytes.
///
/// Carries the partially-decoded header when parsing got that far; see
/// [`ParsedHeader`] for why.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageParseError {
  /// What went wrong
  pub reason: ParseErrorReason,
  /// Header decoded before the failure, if any
  pub header: Option<ParsedHeader>,
}

impl MessageParseError {
  /// Shorthand for an end-of-stream failure with no recovered context
  pub fn eof() -> Self {
    MessageParseError { reason: ParseErrorReason::UnexpectedEndOfStream,
                        header: None }
  }
}
