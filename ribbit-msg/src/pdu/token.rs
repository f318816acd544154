use tinyvec::ArrayVec;

/// # Message Token
///
/// Opaque 0-8 byte value linking a request to its response, independent
/// of the message [`Id`](super::Id): an Id pairs a Confirmable message
/// with its Acknowledgement, while the Token pairs a request with the
/// (possibly much later, possibly differently-Id'd) response that
/// answers it.
///
/// See [RFC7252 §5.3.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1)
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

/// The longest token the wire format can express, in bytes
pub const MAX_TOKEN_LENGTH: usize = 8;

impl Token {
  /// Take an arbitrary-length sequence of bytes and turn it into an opaque message token
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change in the future.
  ///
  /// ```
  /// use ribbit_msg::Token;
  ///
  /// let my_token = Token::opaque(&[0, 1, 2]);
  /// ```
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).into())
  }
}

impl AsRef<[u8]> for Token {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}
