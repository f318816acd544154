/// Errors encounterable while parsing an option from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum OptParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Option Delta nibble was set to 15, which is reserved for the payload marker
  DeltaReservedValue(u8),

  /// Value Length nibble was set to 15, which is reserved for the payload marker
  LengthReservedValue(u8),

  /// The running option number left the 16-bit option number space
  OptionNumberTooBig(u32),

  /// A payload marker (0xFF) with nothing after it; the marker promises
  /// at least one byte of payload
  PayloadMarkerWithoutPayload,
}

impl OptParseError {
  /// Shorthand for [`OptParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}
