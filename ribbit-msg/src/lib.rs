//! Low-level representation of CoAP messages (RFC 7252, RFC 8323).
//!
//! The most notable item in `ribbit_msg` is [`Pdu`]: one CoAP message,
//! stored very close to the actual byte layout.
//!
//! ## Storage
//! A [`Pdu`] owns a single contiguous buffer with two logical regions:
//!
//! ```text
//! <--header reservation--><--token--><--options--> 0xFF <--payload-->
//! ```
//!
//! The transport header is only known once the message is final (CoAP over
//! TCP has four header shapes depending on the declared body length), so
//! space for the largest possible header is reserved up front and filled in
//! by [`Pdu::encode_header`] immediately before the token.
//!
//! All positions handed out by the mutation API are offsets relative to the
//! token, never raw addresses; growing the buffer repositions storage but
//! leaves every offset intact.
//!
//! ## Transports
//! The [`frame`] module knows how large a protocol header is before the
//! whole message has been buffered ([`frame::parse_header_size`]) and how
//! long the full message will be once enough header bytes are available
//! ([`frame::parse_size`]). Datagram transports are trivially sized; the
//! stream transports use the variable-length header of
//! [RFC 8323 §3.2](https://datatracker.ietf.org/doc/html/rfc8323#section-3.2).

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![deny(missing_docs)]

/// Transport-specific header framing
pub mod frame;

/// Message structs
pub mod pdu;

#[doc(inline)]
pub use frame::*;
#[doc(inline)]
pub use pdu::*;

/// Default CoAP port for UDP and TCP
pub const DEFAULT_PORT: u16 = 5683;

/// Default CoAP port for DTLS and TLS
pub const DEFAULT_SECURE_PORT: u16 = 5684;

/// Default transmission unit; a reasonable size hint for outbound messages
pub const DEFAULT_MTU: usize = 1152;

#[cfg(test)]
pub(crate) fn test_pdu() -> (Pdu, Vec<u8>) {
  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  // 16 value bytes: delta nibble 11, length nibble 13 + one extension byte
  let uri_path: &[u8] = b"temperature-logs";
  let options: [&[u8]; 2] = [&[0b1011_1101u8, 0b0000_0011u8], uri_path];
  let payload: [&[u8]; 2] = [&[0b1111_1111u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let mut pdu = Pdu::new(Type::Con, Code::new(2, 5), Id(1), 64);
  pdu.set_token(&[254]).unwrap();
  pdu.add_option(OptNumber::URI_PATH, uri_path).unwrap();
  pdu.set_payload(b"hello, world!").unwrap();

  (pdu, bytes)
}

#[cfg(test)]
pub(crate) mod tests {
  /// Assert two bytes are equal, printing both in binary on failure
  #[macro_export]
  macro_rules! assert_eqb {
    ($actual:expr, $expected:expr) => {
      if $actual != $expected {
        panic!("expected {:08b} to equal {:08b}", $actual, $expected)
      }
    };
  }

  /// Assert two byte sequences are equal, printing both in binary on
  /// failure
  #[macro_export]
  macro_rules! assert_eqb_iter {
    ($actual:expr, $expected:expr) => {
      if $actual.iter().ne($expected.iter()) {
        panic!("expected {:?} to equal {:?}",
               $actual.into_iter()
                      .map(|b| format!("{:08b}", b))
                      .collect::<Vec<_>>(),
               $expected.into_iter()
                        .map(|b| format!("{:08b}", b))
                        .collect::<Vec<_>>())
      }
    };
  }
}
