/// # Message Code
///
/// 8-bit value split into a 3-bit class and 5-bit detail, conventionally
/// written `c.dd` (e.g. the Content response is `2.05`).
///
/// |class|meaning|
/// |---|---|
/// |`0`|Message is a request (or the empty message when detail is also 0)|
/// |`2`|Message is a success response|
/// |`4`|Message is a client error response|
/// |`5`|Message is a server error response|
/// |`7`|Message is a stream-transport signaling message (RFC 8323)|
///
/// ```
/// use ribbit_msg::Code;
/// assert_eq!(Code { class: 2, detail: 5 }.to_string(), "2.05".to_string())
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Code {
  /// The "class" of the code; identifies it as a request or response and
  /// provides the class of response status
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) providing granular information
  /// about the response status. Identifies the method for requests.
  pub detail: u8,
}

/// What role a [`Code`] plays in the protocol, going by its numeric range.
///
/// See [RFC7252 §12.1](https://datatracker.ietf.org/doc/html/rfc7252#section-12.1)
/// and [RFC8323 §5](https://datatracker.ietf.org/doc/html/rfc8323#section-5)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum CodeKind {
  /// Code 0; an empty message carrying no token, options or payload
  Empty,
  /// Codes 1-31; request methods
  Request,
  /// Codes 64-223; response statuses
  Response,
  /// Codes 224 and up; stream-transport signaling (CSM, Ping, Pong, Release, Abort)
  Signaling,
  /// Codes 32-63; reserved by RFC7252
  Reserved,
}

impl Code {
  /// The empty message code, 0.00
  pub const EMPTY: Code = Code::new(0, 0);

  /// GET request method
  pub const GET: Code = Code::new(0, 1);
  /// POST request method
  pub const POST: Code = Code::new(0, 2);
  /// PUT request method
  pub const PUT: Code = Code::new(0, 3);
  /// DELETE request method
  pub const DELETE: Code = Code::new(0, 4);
  /// FETCH request method (RFC 8132)
  pub const FETCH: Code = Code::new(0, 5);
  /// PATCH request method (RFC 8132)
  pub const PATCH: Code = Code::new(0, 6);
  /// iPATCH request method (RFC 8132)
  pub const IPATCH: Code = Code::new(0, 7);

  /// Capabilities and Settings signaling message (RFC 8323)
  pub const CSM: Code = Code::new(7, 1);
  /// Ping signaling message (RFC 8323)
  pub const PING: Code = Code::new(7, 2);
  /// Pong signaling message (RFC 8323)
  pub const PONG: Code = Code::new(7, 3);
  /// Release signaling message (RFC 8323)
  pub const RELEASE: Code = Code::new(7, 4);
  /// Abort signaling message (RFC 8323)
  pub const ABORT: Code = Code::new(7, 5);

  /// Create a new Code
  ///
  /// ```
  /// use ribbit_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// What role this code plays in the protocol
  ///
  /// ```
  /// use ribbit_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::GET.kind(), CodeKind::Request);
  /// assert_eq!(Code::new(4, 4).kind(), CodeKind::Response);
  /// assert_eq!(Code::PING.kind(), CodeKind::Signaling);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match u8::from(*self) {
      | 0 => CodeKind::Empty,
      | 1..=31 => CodeKind::Request,
      | 64..=223 => CodeKind::Response,
      | 224..=255 => CodeKind::Signaling,
      | _ => CodeKind::Reserved,
    }
  }

  /// Human-readable response phrase, if this is a response code we know.
  ///
  /// ```
  /// use ribbit_msg::Code;
  ///
  /// assert_eq!(Code::new(4, 4).phrase(), Some("Not Found"));
  /// assert_eq!(Code::new(0, 1).phrase(), None);
  /// ```
  pub fn phrase(&self) -> Option<&'static str> {
    match (self.class, self.detail) {
      | (2, 1) => Some("Created"),
      | (2, 2) => Some("Deleted"),
      | (2, 3) => Some("Valid"),
      | (2, 4) => Some("Changed"),
      | (2, 5) => Some("Content"),
      | (2, 31) => Some("Continue"),
      | (4, 0) => Some("Bad Request"),
      | (4, 1) => Some("Unauthorized"),
      | (4, 2) => Some("Bad Option"),
      | (4, 3) => Some("Forbidden"),
      | (4, 4) => Some("Not Found"),
      | (4, 5) => Some("Method Not Allowed"),
      | (4, 6) => Some("Not Acceptable"),
      | (4, 8) => Some("Request Entity Incomplete"),
      | (4, 9) => Some("Conflict"),
      | (4, 12) => Some("Precondition Failed"),
      | (4, 13) => Some("Request Entity Too Large"),
      | (4, 15) => Some("Unsupported Content-Format"),
      | (4, 22) => Some("Unprocessable Entity"),
      | (4, 29) => Some("Too Many Requests"),
      | (5, 0) => Some("Internal Server Error"),
      | (5, 1) => Some("Not Implemented"),
      | (5, 2) => Some("Bad Gateway"),
      | (5, 3) => Some("Service Unavailable"),
      | (5, 4) => Some("Gateway Timeout"),
      | (5, 5) => Some("Proxying Not Supported"),
      | (5, 8) => Some("Hop Limit Reached"),
      | _ => None,
    }
  }

  /// Get the human string representation of a message code
  ///
  /// ```
  /// use ribbit_msg::Code;
  ///
  /// let code = Code { class: 2, detail: 5 };
  /// let chars = code.to_human();
  /// assert_eq!(String::from_iter(chars), "2.05".to_string());
  /// ```
  pub fn to_human(&self) -> [char; 4] {
    let to_char = |d: u8| char::from_digit(d.into(), 10).unwrap_or('?');
    [to_char(self.class),
     '.',
     to_char(self.detail / 10),
     to_char(self.detail % 10)]
  }
}

impl core::fmt::Display for Code {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let [a, b, c, d] = self.to_human();
    write!(f, "{}{}{}{}", a, b, c, d)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    let class = b >> 5;
    let detail = b & 0b11111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail;

    class | detail
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_eqb;

  #[test]
  fn parse_code() {
    let byte = 0b_01_000101u8;
    let code = Code::from(byte);
    assert_eq!(code, Code { class: 2, detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 2, detail: 5 };
    let actual: u8 = code.into();
    let expected = 0b_010_00101u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn code_kinds() {
    assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
    assert_eq!(Code::IPATCH.kind(), CodeKind::Request);
    assert_eq!(Code::new(5, 3).kind(), CodeKind::Response);
    assert_eq!(Code::ABORT.kind(), CodeKind::Signaling);
    assert_eq!(Code::new(1, 5).kind(), CodeKind::Reserved);
  }

  #[test]
  fn signaling_codes() {
    // 7.01 through 7.05 sit at 225..=229
    assert_eq!(u8::from(Code::CSM), 225);
    assert_eq!(u8::from(Code::ABORT), 229);
  }
}
