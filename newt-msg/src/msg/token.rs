use tinyvec::ArrayVec;

/// # Token
///
/// 0-8 opaque bytes chosen by the client to correlate a request with
/// its response, independently of the message ID. A separate response
/// (one arriving after an empty ACK) carries the request's token but a
/// fresh message ID; the token is the only thread tying the two
/// together.
///
/// See [RFC7252 §5.3.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1)
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Take an arbitrary-length sequence of bytes and turn it into an
  /// opaque 8-byte token.
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change
  /// in the future.
  ///
  /// ```
  /// use newt_msg::Token;
  ///
  /// let token = Token::opaque(b"device-31 seq 200");
  /// assert_eq!(token.0.len(), 8);
  /// ```
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).into())
  }
}
