//! Transport-specific protocol headers.
//!
//! Over datagram transports the CoAP header is a fixed 4 bytes and the
//! message boundary is the datagram itself. Over stream transports
//! (RFC 8323) there is no boundary, so the header leads with a length
//! field that comes in four sizes; a receiver first asks how much header
//! to buffer ([`parse_header_size`]), then how long the full message is
//! ([`parse_size`]), and only then allocates for the message.

use tinyvec::ArrayVec;

use crate::pdu::{Code, Id, MessageParseError, Type};

/// Transport a PDU is framed for
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Proto {
  /// CoAP over UDP (RFC 7252)
  Udp,
  /// CoAP over DTLS (RFC 7252)
  Dtls,
  /// CoAP over TCP (RFC 8323)
  Tcp,
  /// CoAP over TLS (RFC 8323)
  Tls,
}

impl Proto {
  /// Whether this transport is a stream (RFC 8323 framing) rather than
  /// a datagram
  pub fn is_reliable(&self) -> bool {
    matches!(self, Proto::Tcp | Proto::Tls)
  }
}

/// Fixed datagram header size
pub const MAX_UDP_HEADER_SIZE: usize = 4;

/// Largest stream header: length nibble 15, four extension bytes, code
pub const MAX_TCP_HEADER_SIZE: usize = 6;

/// Header reservation large enough for any supported transport
pub const MAX_HEADER_SIZE: usize = MAX_TCP_HEADER_SIZE;

/// Base offset encoded by stream length nibble 13 (one extension byte)
pub const SIZE_OFFSET_TCP8: usize = 13;
/// Base offset encoded by stream length nibble 14 (two extension bytes)
pub const SIZE_OFFSET_TCP16: usize = 269;
/// Base offset encoded by stream length nibble 15 (four extension bytes)
pub const SIZE_OFFSET_TCP32: usize = 65805;

/// Longest body expressible without extension bytes
pub const MAX_SIZE_TCP0: usize = SIZE_OFFSET_TCP8 - 1;
/// Longest body expressible with one extension byte
pub const MAX_SIZE_TCP8: usize = SIZE_OFFSET_TCP16 - 1;
/// Longest body expressible with two extension bytes
pub const MAX_SIZE_TCP16: usize = SIZE_OFFSET_TCP32 - 1;

/// Everything a protocol header can say about a message. Stream headers
/// carry no type or message id; those parse as `Con` and `Id(0)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Header {
  pub(crate) ty: Type,
  pub(crate) code: Code,
  pub(crate) id: Id,
  pub(crate) tkl: u8,
}

/// Errors encounterable composing a protocol header
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EncodeError {
  /// The PDU's header reservation is smaller than this transport's
  /// header; the PDU was created for a different transport
  HeaderSpaceExceeded {
    /// Bytes this header needs
    need: usize,
    /// Bytes the PDU reserved
    reserved: usize,
  },
}

/// How many bytes of header must be buffered before [`parse_size`] can
/// compute the full message length. Needs only the first byte.
pub fn parse_header_size(proto: Proto, data: &[u8]) -> Result<usize, MessageParseError> {
  let first = *data.first().ok_or_else(MessageParseError::eof)?;

  match proto {
    | Proto::Udp | Proto::Dtls => Ok(MAX_UDP_HEADER_SIZE),
    | Proto::Tcp | Proto::Tls => match first >> 4 {
      | 13 => Ok(3),
      | 14 => Ok(4),
      | 15 => Ok(6),
      | _ => Ok(2),
    },
  }
}

/// Total length of the message whose header starts `data`, including the
/// header itself. `data` must hold at least
/// [`parse_header_size`]`(proto, data)` bytes.
///
/// Datagram transports have no length field; the caller passes the whole
/// datagram and its length is the answer.
pub fn parse_size(proto: Proto, data: &[u8]) -> Result<usize, MessageParseError> {
  let hdr_size = parse_header_size(proto, data)?;

  if proto == Proto::Udp || proto == Proto::Dtls {
    return Ok(data.len());
  }

  if data.len() < hdr_size {
    return Err(MessageParseError::eof());
  }

  let tkl = (data[0] & 0b1111) as usize;
  let len = match data[0] >> 4 {
    | 13 => data[1] as usize + SIZE_OFFSET_TCP8,
    | 14 => u16::from_be_bytes([data[1], data[2]]) as usize + SIZE_OFFSET_TCP16,
    | 15 => u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize + SIZE_OFFSET_TCP32,
    | n => n as usize,
  };

  Ok(hdr_size + tkl + len)
}

/// Decode the fields of the protocol header in `data` (already known to
/// be [`parse_header_size`] bytes long).
pub(crate) fn decode_header(proto: Proto, data: &[u8]) -> Result<Header, MessageParseError> {
  let hdr_size = parse_header_size(proto, data)?;

  if data.len() < hdr_size {
    return Err(MessageParseError::eof());
  }

  match proto {
    | Proto::Udp | Proto::Dtls => {
      let ver = data[0] >> 6;
      if ver != 1 {
        return Err(MessageParseError::InvalidVersion(ver));
      }

      Ok(Header { ty: Type::try_from(data[0] >> 4 & 0b11)?,
                  code: Code::from(data[1]),
                  id: Id::from_be_bytes([data[2], data[3]]),
                  tkl: data[0] & 0b1111 })
    },
    | Proto::Tcp | Proto::Tls => Ok(Header { ty: Type::Con,
                                             code: Code::from(data[hdr_size - 1]),
                                             id: Id(0),
                                             tkl: data[0] & 0b1111 }),
  }
}

/// Compose the smallest protocol header for a message with the given
/// body length after the token (options + marker + payload).
pub(crate) fn encode_header(proto: Proto,
                            ty: Type,
                            code: Code,
                            id: Id,
                            tkl: u8,
                            len_after_token: usize)
                            -> ArrayVec<[u8; MAX_HEADER_SIZE]> {
  let mut out = ArrayVec::new();

  match proto {
    | Proto::Udp | Proto::Dtls => {
      out.push(1 << 6 | u8::from(ty) << 4 | tkl);
      out.push(code.into());
      out.extend_from_slice(&<[u8; 2]>::from(id));
    },
    | Proto::Tcp | Proto::Tls => {
      match len_after_token {
        | n if n <= MAX_SIZE_TCP0 => {
          out.push((n as u8) << 4 | tkl);
        },
        | n if n <= MAX_SIZE_TCP8 => {
          out.push(13 << 4 | tkl);
          out.push((n - SIZE_OFFSET_TCP8) as u8);
        },
        | n if n <= MAX_SIZE_TCP16 => {
          out.push(14 << 4 | tkl);
          out.extend_from_slice(&((n - SIZE_OFFSET_TCP16) as u16).to_be_bytes());
        },
        | n => {
          out.push(15 << 4 | tkl);
          out.extend_from_slice(&((n - SIZE_OFFSET_TCP32) as u32).to_be_bytes());
        },
      }
      out.push(code.into());
    },
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn udp_header_is_always_four_bytes() {
    assert_eq!(parse_header_size(Proto::Udp, &[0b0100_0000]), Ok(4));
    assert_eq!(parse_header_size(Proto::Dtls, &[0b0100_0101]), Ok(4));
    assert_eq!(parse_header_size(Proto::Udp, &[]),
               Err(MessageParseError::eof()));
  }

  #[test]
  fn udp_size_is_the_datagram() {
    let dgram = [0b0100_0000u8, 0x01, 0x12, 0x34, 0xFF, 1, 2, 3];
    assert_eq!(parse_size(Proto::Udp, &dgram), Ok(8));
  }

  #[test]
  fn tcp_header_size_classes() {
    // body length -> (first byte, expected header size)
    let cases: [(usize, usize); 4] = [(12, 2), (13, 3), (269, 4), (65805, 6)];

    for (len, hdr_size) in cases {
      let hdr = encode_header(Proto::Tcp, Type::Con, Code::GET, Id(0), 0, len);
      assert_eq!(hdr.len(), hdr_size, "body length {}", len);
      assert_eq!(parse_header_size(Proto::Tcp, hdr.as_slice()), Ok(hdr_size));
      assert_eq!(parse_size(Proto::Tcp, hdr.as_slice()), Ok(hdr_size + len));
    }
  }

  #[test]
  fn tcp_size_counts_header_token_and_body() {
    // len nibble 13, tkl 2, ext byte 0 -> body 13, total 3 + 2 + 13
    let hdr = [0b1101_0010u8, 0, 0x01];
    assert_eq!(parse_size(Proto::Tcp, &hdr), Ok(18));
  }

  #[test]
  fn tcp_truncated_extension_rejected() {
    assert_eq!(parse_size(Proto::Tcp, &[0b1110_0000u8, 1]),
               Err(MessageParseError::eof()));
  }

  #[test]
  fn udp_header_fields_roundtrip() {
    let hdr = encode_header(Proto::Udp, Type::Ack, Code::new(2, 5), Id(0xBEEF), 3, 10);
    let got = decode_header(Proto::Udp, hdr.as_slice()).unwrap();
    assert_eq!(got,
               Header { ty: Type::Ack,
                        code: Code::new(2, 5),
                        id: Id(0xBEEF),
                        tkl: 3 });
  }

  #[test]
  fn tcp_header_fields_parse_as_con() {
    let hdr = encode_header(Proto::Tls, Type::Non, Code::PING, Id(7), 0, 0);
    let got = decode_header(Proto::Tls, hdr.as_slice()).unwrap();
    assert_eq!(got,
               Header { ty: Type::Con,
                        code: Code::PING,
                        id: Id(0),
                        tkl: 0 });
  }

  #[test]
  fn bad_version_rejected() {
    let hdr = [0b1000_0000u8, 0x01, 0, 0];
    assert_eq!(decode_header(Proto::Udp, &hdr),
               Err(MessageParseError::InvalidVersion(2)));
  }
}
