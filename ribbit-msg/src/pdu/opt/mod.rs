use tinyvec::ArrayVec;

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// The largest option number the wire format can express
pub const MAX_OPT_NUMBER: u16 = 65535;

/// The largest option value length the wire format can express
/// (nibble 14, two extension bytes, base offset 269)
pub const MAX_VALUE_LENGTH: usize = 65804;

/// # Option Number
///
/// Identifies which option is being set (e.g. Content-Format is number 12).
///
/// Numbers are never written to the wire directly; each option stores the
/// _delta_ from its predecessor's number, which keeps small, clustered or
/// repeated numbers compact. That is why options must be stored in
/// non-decreasing number order.
///
/// The number's low bits describe how an implementation that does not
/// recognize the option must treat it
/// ([RFC7252 §5.4.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.4.6)):
///
/// ```text
///   0   1   2   3   4   5   6   7
/// --+---+---+---+---+---+---+---+
///           | NoCacheKey| U | C |
/// --+---+---+---+---+---+---+---+
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u16);

impl OptNumber {
  /// If-Match, opaque, 0-8 bytes (RFC7252)
  pub const IF_MATCH: OptNumber = OptNumber(1);
  /// Uri-Host, string, 1-255 bytes (RFC7252)
  pub const URI_HOST: OptNumber = OptNumber(3);
  /// ETag, opaque, 1-8 bytes (RFC7252)
  pub const ETAG: OptNumber = OptNumber(4);
  /// If-None-Match, empty (RFC7252)
  pub const IF_NONE_MATCH: OptNumber = OptNumber(5);
  /// Observe, uint, 0-3 bytes (RFC7641)
  pub const OBSERVE: OptNumber = OptNumber(6);
  /// Uri-Port, uint, 0-2 bytes (RFC7252)
  pub const URI_PORT: OptNumber = OptNumber(7);
  /// Location-Path, string, 0-255 bytes (RFC7252)
  pub const LOCATION_PATH: OptNumber = OptNumber(8);
  /// OSCORE, 0-255 bytes (RFC8613)
  pub const OSCORE: OptNumber = OptNumber(9);
  /// Uri-Path, string, 0-255 bytes, repeatable (RFC7252)
  pub const URI_PATH: OptNumber = OptNumber(11);
  /// Content-Format, uint, 0-2 bytes (RFC7252)
  pub const CONTENT_FORMAT: OptNumber = OptNumber(12);
  /// Max-Age, uint, 0-4 bytes (RFC7252)
  pub const MAX_AGE: OptNumber = OptNumber(14);
  /// Uri-Query, string, 1-255 bytes, repeatable (RFC7252)
  pub const URI_QUERY: OptNumber = OptNumber(15);
  /// Hop-Limit, uint, 1 byte (RFC8768)
  pub const HOP_LIMIT: OptNumber = OptNumber(16);
  /// Accept, uint, 0-2 bytes (RFC7252)
  pub const ACCEPT: OptNumber = OptNumber(17);
  /// Location-Query, string, 0-255 bytes, repeatable (RFC7252)
  pub const LOCATION_QUERY: OptNumber = OptNumber(20);
  /// Block2, uint, 0-3 bytes (RFC7959)
  pub const BLOCK2: OptNumber = OptNumber(23);
  /// Block1, uint, 0-3 bytes (RFC7959)
  pub const BLOCK1: OptNumber = OptNumber(27);
  /// Size2, uint, 0-4 bytes (RFC7959)
  pub const SIZE2: OptNumber = OptNumber(28);
  /// Proxy-Uri, string, 1-1034 bytes (RFC7252)
  pub const PROXY_URI: OptNumber = OptNumber(35);
  /// Proxy-Scheme, string, 1-255 bytes (RFC7252)
  pub const PROXY_SCHEME: OptNumber = OptNumber(39);
  /// Size1, uint, 0-4 bytes (RFC7252)
  pub const SIZE1: OptNumber = OptNumber(60);
  /// No-Response, uint, 0-1 bytes (RFC7967)
  pub const NO_RESPONSE: OptNumber = OptNumber(258);

  /// Max-Message-Size option on CSM signaling messages (RFC8323)
  pub const SIG_MAX_MESSAGE_SIZE: OptNumber = OptNumber(2);
  /// Block-Wise-Transfer option on CSM signaling messages (RFC8323)
  pub const SIG_BLOCK_WISE_TRANSFER: OptNumber = OptNumber(4);
  /// Custody option on Ping/Pong signaling messages (RFC8323)
  pub const SIG_CUSTODY: OptNumber = OptNumber(2);
  /// Alternative-Address option on Release signaling messages (RFC8323)
  pub const SIG_ALTERNATIVE_ADDRESS: OptNumber = OptNumber(2);
  /// Hold-Off option on Release signaling messages (RFC8323)
  pub const SIG_HOLD_OFF: OptNumber = OptNumber(4);
  /// Bad-CSM-Option option on Abort signaling messages (RFC8323)
  pub const SIG_BAD_CSM_OPTION: OptNumber = OptNumber(2);

  /// Whether an implementation that does not recognize this option
  /// must reject the message carrying it
  pub fn is_critical(&self) -> bool {
    self.0 & 0b1 == 1
  }

  /// Whether a proxy that does not recognize this option must refuse
  /// to forward the message carrying it
  pub fn is_unsafe_to_forward(&self) -> bool {
    self.0 & 0b10 == 0b10
  }

  /// Whether different values for this option should still hit a
  /// forwarding proxy's cached response
  pub fn is_no_cache_key(&self) -> bool {
    (self.0 & 0b11100) == 0b11100
  }

  /// The longest value the base protocol documents for this option
  /// number, or `None` for numbers we know nothing about.
  ///
  /// These are the per-option maxima from the option tables of RFC7252,
  /// RFC7641, RFC7959, RFC7967, RFC8613 and RFC8768.
  pub fn value_len_max(&self) -> Option<usize> {
    match *self {
      | Self::IF_MATCH | Self::ETAG => Some(8),
      | Self::IF_NONE_MATCH => Some(0),
      | Self::OBSERVE | Self::BLOCK2 | Self::BLOCK1 => Some(3),
      | Self::URI_PORT | Self::CONTENT_FORMAT | Self::ACCEPT => Some(2),
      | Self::MAX_AGE | Self::SIZE2 | Self::SIZE1 => Some(4),
      | Self::HOP_LIMIT => Some(1),
      | Self::NO_RESPONSE => Some(1),
      | Self::URI_HOST
      | Self::LOCATION_PATH
      | Self::OSCORE
      | Self::URI_PATH
      | Self::URI_QUERY
      | Self::LOCATION_QUERY
      | Self::PROXY_SCHEME => Some(255),
      | Self::PROXY_URI => Some(1034),
      | _ => None,
    }
  }
}

/// One decoded option header: the delta and value length it declares,
/// and how many bytes the header itself occupied.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct OptHeader {
  /// Difference between this option's number and its predecessor's
  pub delta: u16,
  /// Declared length of the value bytes that follow the header
  pub value_len: usize,
  /// Bytes occupied by the header itself (1 + extension bytes)
  pub header_len: usize,
}

/// Encode a delta or length as its nibble plus extension bytes.
///
/// Nibble 13 means "one extension byte, value - 13"; nibble 14 means
/// "two big-endian extension bytes, value - 269". The caller guarantees
/// `val` is expressible (<= 65804).
pub(crate) fn nibble_ext(val: u32) -> (u8, ArrayVec<[u8; 2]>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend_from_slice(&((n - 269) as u16).to_be_bytes());
      (14, bytes)
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n - 13) as u8);
      (13, bytes)
    },
    | n => (n as u8, ArrayVec::new()),
  }
}

fn ext_size(val: usize) -> usize {
  match val {
    | n if n >= 269 => 2,
    | n if n >= 13 => 1,
    | _ => 0,
  }
}

/// Bytes one option will occupy on the wire: 1 header byte, 0-2 extended
/// delta bytes, 0-2 extended length bytes, then the value itself.
pub fn encoded_size(delta: u16, value_len: usize) -> usize {
  1 + ext_size(delta as usize) + ext_size(value_len) + value_len
}

/// Encode just the header (nibbles + extension bytes) of an option with
/// the given delta and value length.
pub(crate) fn header_bytes(delta: u16, value_len: usize) -> ArrayVec<[u8; 5]> {
  let (dn, dext) = nibble_ext(delta as u32);
  let (ln, lext) = nibble_ext(value_len as u32);

  let mut out = ArrayVec::new();
  out.push(dn << 4 | ln);
  out.extend_from_slice(&dext);
  out.extend_from_slice(&lext);
  out
}

/// Decode the option header at `bytes[at]`.
///
/// Fails if either nibble is the reserved value 15 (only legal as part of
/// the payload marker byte), if an extension byte would read past the end
/// of `bytes`, or if the declared value would.
pub fn decode_header(bytes: &[u8], at: usize) -> Result<OptHeader, OptParseError> {
  let head = *bytes.get(at).ok_or_else(OptParseError::eof)?;
  let mut off = at + 1;

  let mut read_ext = |nib: u8, reserved: OptParseError| -> Result<u32, OptParseError> {
    match nib {
      | 13 => {
        let b = *bytes.get(off).ok_or_else(OptParseError::eof)?;
        off += 1;
        Ok(b as u32 + 13)
      },
      | 14 => match bytes.get(off..off + 2) {
        | Some(&[a, b]) => {
          off += 2;
          Ok(u16::from_be_bytes([a, b]) as u32 + 269)
        },
        | _ => Err(OptParseError::eof()),
      },
      | 15 => Err(reserved),
      | n => Ok(n as u32),
    }
  };

  let delta = read_ext(head >> 4, OptParseError::DeltaReservedValue(15))?;
  let value_len = read_ext(head & 0b1111, OptParseError::LengthReservedValue(15))?;

  if delta > MAX_OPT_NUMBER as u32 {
    return Err(OptParseError::OptionNumberTooBig(delta));
  }

  let header_len = off - at;
  let value_len = value_len as usize;

  if at + header_len + value_len > bytes.len() {
    return Err(OptParseError::eof());
  }

  Ok(OptHeader { delta: delta as u16,
                 value_len,
                 header_len })
}

/// Iterator over an already-validated encoded option region, yielding
/// each option's number and value bytes in wire order.
///
/// The running sum of deltas is kept internally; numbers come out
/// non-decreasing by construction.
#[derive(Clone, Copy, Debug)]
pub struct OptIter<'a> {
  bytes: &'a [u8],
  off: usize,
  number: u16,
}

impl<'a> OptIter<'a> {
  pub(crate) fn new(bytes: &'a [u8]) -> Self {
    Self { bytes,
           off: 0,
           number: 0 }
  }
}

impl<'a> Iterator for OptIter<'a> {
  type Item = (OptNumber, &'a [u8]);

  fn next(&mut self) -> Option<Self::Item> {
    if self.off >= self.bytes.len() {
      return None;
    }

    // region was validated when the PDU was built or parsed
    let h = decode_header(self.bytes, self.off).ok()?;

    self.number = self.number.checked_add(h.delta)?;
    let start = self.off + h.header_len;
    self.off = start + h.value_len;

    Some((OptNumber(self.number), &self.bytes[start..start + h.value_len]))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn nibble_boundaries() {
    // (value, expected nibble, expected extension bytes)
    let cases: [(u32, u8, &[u8]); 6] = [(12, 12, &[]),
                                        (13, 13, &[0]),
                                        (268, 13, &[255]),
                                        (269, 14, &[0, 0]),
                                        (65804, 14, &[255, 255]),
                                        (65535, 14, &[0xFE, 0xF2])];

    for (val, nib, ext) in cases {
      let (n, bs) = nibble_ext(val);
      assert_eq!((n, bs.as_slice()), (nib, ext), "value {}", val);
    }
  }

  #[test]
  fn header_roundtrip_boundaries() {
    for delta in [0u16, 12, 13, 268, 269, 65535] {
      for len in [0usize, 1, 12, 13, 268, 269, 1024] {
        let hdr = header_bytes(delta, len);
        let mut bytes = hdr.to_vec();
        bytes.extend(core::iter::repeat(0).take(len));

        let got = decode_header(&bytes, 0).unwrap();
        assert_eq!(got,
                   OptHeader { delta,
                               value_len: len,
                               header_len: hdr.len() });
        assert_eq!(encoded_size(delta, len), hdr.len() + len);
      }
    }
  }

  #[test]
  fn extension_byte_counts() {
    // number 13 away from zero: one extension byte, base offset 13
    assert_eq!(header_bytes(13, 0).as_slice(), &[0b1101_0000, 0]);
    // number 269 away: two extension bytes, base offset 269
    assert_eq!(header_bytes(269, 0).as_slice(), &[0b1110_0000, 0, 0]);
  }

  #[test]
  fn reserved_nibbles_rejected() {
    assert_eq!(decode_header(&[0xFF], 0),
               Err(OptParseError::DeltaReservedValue(15)));
    assert_eq!(decode_header(&[0b0001_1111, 0], 0),
               Err(OptParseError::LengthReservedValue(15)));
  }

  #[test]
  fn truncation_rejected() {
    // nibble 13 promises an extension byte that isn't there
    assert_eq!(decode_header(&[0b1101_0000], 0), Err(OptParseError::eof()));
    // nibble 14 promises two
    assert_eq!(decode_header(&[0b1110_0000, 1], 0), Err(OptParseError::eof()));
    // declared value longer than the buffer
    assert_eq!(decode_header(&[0b0000_0011, 1, 2], 0),
               Err(OptParseError::eof()));
  }

  #[test]
  fn number_qualities() {
    assert!(OptNumber::IF_MATCH.is_critical());
    assert!(!OptNumber::ETAG.is_critical());
    assert!(OptNumber::URI_HOST.is_unsafe_to_forward());
    assert!(!OptNumber::IF_MATCH.is_unsafe_to_forward());
    assert!(OptNumber::SIZE1.is_no_cache_key());
    assert!(!OptNumber::ETAG.is_no_cache_key());
  }

  #[test]
  fn iter_accumulates_deltas() {
    // deltas 11, 1, 0 -> numbers 11, 12, 12
    let bytes = [0b1011_0001u8, 0xAA, 0b0001_0001, 0xBB, 0b0000_0001, 0xCC];
    let got = OptIter::new(&bytes).collect::<Vec<_>>();
    assert_eq!(got,
               vec![(OptNumber(11), [0xAA].as_ref()),
                    (OptNumber(12), [0xBB].as_ref()),
                    (OptNumber(12), [0xCC].as_ref())]);
  }
}
