/// Protocol version bits of a datagram message header.
///
/// The only version defined by
/// [RFC7252 §3](https://datatracker.ietf.org/doc/html/rfc7252#section-3) is 1;
/// parsing rejects anything else. Stream transports (RFC 8323) carry no
/// version bits at all, so messages parsed from them report the default.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}
