use super::opt::OptParseError;

/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Version bits were not 1 (datagram transports only)
  InvalidVersion(u8),

  /// Token length nibble was > 8, or promised more bytes than the message holds
  InvalidTokenLength(u8),

  /// The message type is invalid (see [`Type`](super::Type) for valid values)
  InvalidType(u8),

  /// Code 0 (the empty message) must not carry a token, options or payload
  UnexpectedDataInEmptyMessage,

  /// Error parsing option
  OptParseError(OptParseError),
}

impl MessageParseError {
  /// Shorthand for [`MessageParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

impl From<OptParseError> for MessageParseError {
  fn from(e: OptParseError) -> Self {
    Self::OptParseError(e)
  }
}
