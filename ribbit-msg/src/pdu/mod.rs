//! One CoAP message, stored close to its wire shape.
//!
//! A [`Pdu`] keeps the token, the delta-encoded option region and the
//! payload contiguous in a single buffer, with room reserved ahead of the
//! token for whichever transport header the message ends up framed with.
//! Mutators keep the option region sorted and the deltas consistent, so
//! serializing is just filling in the header ([`Pdu::encode_header`]) and
//! handing out the buffer ([`Pdu::as_bytes`]).

use std::sync::Arc;

use crate::frame::{self, EncodeError, Proto, MAX_HEADER_SIZE};

mod buffer;
mod code;
mod id;
mod parse_error;
mod token;
mod ty;
mod ver;

/// Option numbers and the delta codec
pub mod opt;

pub use code::*;
pub use id::*;
pub use opt::{OptIter, OptNumber, OptParseError};
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use buffer::Buffer;
use opt::OptHeader;

/// Byte separating the option region from the payload.
///
/// Its presence promises at least one byte of payload after it.
pub const PAYLOAD_MARKER: u8 = 0xFF;

/// Errors encounterable while composing or mutating a message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteError {
  /// Token was longer than [`MAX_TOKEN_LENGTH`]
  TokenTooLong(usize),

  /// The mutation would have grown the body past the size ceiling.
  /// The message was not modified.
  CapacityExceeded {
    /// Body size the mutation needed
    required: usize,
    /// The ceiling set at construction or by [`Pdu::set_max_size`]
    max: usize,
  },

  /// Option value was longer than this option allows
  OptionValueTooLong {
    /// The option being added
    number: OptNumber,
    /// Length of the value given
    actual: usize,
    /// This option's documented maximum, or the encodable ceiling
    max: usize,
  },

  /// No option with this number is present
  OptionNotFound(OptNumber),

  /// The payload may only be set once between clears
  PayloadAlreadySet,
}

/// A message's payload located within the larger body it is one block of.
///
/// For a message that was not transferred block-wise, `offset` is 0 and
/// `total` is `data.len()`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Body<'a> {
  /// The payload bytes (the whole reassembled body when a
  /// [`BodyView`] is attached)
  pub data: &'a [u8],
  /// Offset of this message's block within the total body
  pub offset: usize,
  /// Length of the body across all blocks
  pub total: usize,
}

/// A reassembled body attached to a message by an external block-wise
/// reassembler, shared rather than copied into the message buffer.
#[derive(Clone, Debug)]
pub struct BodyView {
  /// The reassembled body bytes
  pub data: Arc<[u8]>,
  /// Offset of the carrying message's block within `data`
  pub offset: usize,
  /// Length of the body; equals `data.len()` once reassembly finished
  pub total: usize,
}

/// One option's place in the encoded region. Offsets are relative to the
/// body start and only valid until the next mutation.
#[derive(Copy, Clone, Debug)]
struct Entry {
  prev: u16,
  number: u16,
  off: usize,
  hdr: OptHeader,
}

/// # Protocol Data Unit
///
/// A CoAP message ([RFC7252](https://datatracker.ietf.org/doc/html/rfc7252)),
/// owned storage:
///
/// ```text
/// <--header reservation--><--token--><--options--> 0xFF <--payload-->
/// ```
///
/// The reservation is [`MAX_HEADER_SIZE`] bytes so one PDU can be framed
/// for any transport; [`Pdu::encode_header`] fills the tail of it once
/// the message is final.
///
/// ```
/// use ribbit_msg::{Code, Id, OptNumber, Pdu, Proto, Type};
///
/// let mut req = Pdu::new(Type::Con, Code::GET, Id(0x0102), 64);
/// req.set_token(&[0xDE, 0xAD]).unwrap();
/// req.add_option(OptNumber::URI_PATH, b"hello").unwrap();
///
/// req.encode_header(Proto::Udp).unwrap();
/// assert_eq!(req.as_bytes()[0], 0b0100_0010);
/// ```
#[derive(Clone, Debug)]
pub struct Pdu {
  ty: Type,
  ver: Version,
  code: Code,
  id: Id,
  buf: Buffer,
  token_len: usize,
  opts_end: usize,
  max_opt: OptNumber,
  hdr_size: usize,
  body_view: Option<BodyView>,
}

impl Pdu {
  /// Create an empty message, hinting how large its body will get.
  ///
  /// The hint sizes the initial allocation; the body may grow past it
  /// freely (see [`Pdu::set_max_size`] for a hard ceiling).
  pub fn new(ty: Type, code: Code, id: Id, size_hint: usize) -> Self {
    Self { ty,
           ver: Version::default(),
           code,
           id,
           buf: Buffer::new(MAX_HEADER_SIZE, size_hint, 0),
           token_len: 0,
           opts_end: 0,
           max_opt: OptNumber(0),
           hdr_size: 0,
           body_view: None }
  }

  /// The message type
  pub fn ty(&self) -> Type {
    self.ty
  }

  /// Change the message type
  pub fn set_ty(&mut self, ty: Type) {
    self.ty = ty;
  }

  /// The message code
  pub fn code(&self) -> Code {
    self.code
  }

  /// Change the message code
  pub fn set_code(&mut self, code: Code) {
    self.code = code;
  }

  /// The message id
  pub fn id(&self) -> Id {
    self.id
  }

  /// Change the message id
  pub fn set_id(&mut self, id: Id) {
    self.id = id;
  }

  /// The protocol version (always 1)
  pub fn version(&self) -> Version {
    self.ver
  }

  /// The message token
  pub fn token(&self) -> Token {
    Token(self.buf.body()[..self.token_len].iter().copied().collect())
  }

  /// Bytes of body (token + options + marker + payload) currently used
  pub fn used_size(&self) -> usize {
    self.buf.used()
  }

  /// The body size ceiling; 0 means the body may grow without bound
  pub fn max_size(&self) -> usize {
    self.buf.max()
  }

  /// Cap how large the body may grow; 0 removes the cap.
  ///
  /// Fails if the body is already larger than the requested cap.
  pub fn set_max_size(&mut self, max: usize) -> Result<(), WriteError> {
    if max != 0 && self.buf.used() > max {
      return Err(WriteError::CapacityExceeded { required: self.buf.used(),
                                                max });
    }
    self.buf.set_max(max);
    Ok(())
  }

  /// Set the token, discarding any options and payload already present.
  ///
  /// The token leads the body, so it must be set before anything else.
  pub fn set_token(&mut self, token: &[u8]) -> Result<(), WriteError> {
    if token.len() > MAX_TOKEN_LENGTH {
      return Err(WriteError::TokenTooLong(token.len()));
    }

    self.buf.fits(token.len())?;
    self.buf.truncate_body(0);
    self.buf.append(token)?;
    self.token_len = token.len();
    self.opts_end = token.len();
    self.max_opt = OptNumber(0);
    self.hdr_size = 0;
    Ok(())
  }

  /// Add an option, keeping the region sorted by number.
  ///
  /// Inserting out of ascending order is fine; the displaced successor's
  /// delta is re-encoded. Equal numbers (repeatable options) keep their
  /// insertion order. Returns the encoded size of the new option.
  ///
  /// Fails without modifying the message when the value exceeds the
  /// option's documented maximum length or the body would pass its
  /// ceiling.
  pub fn add_option(&mut self, number: OptNumber, value: &[u8]) -> Result<usize, WriteError> {
    let max = number.value_len_max().unwrap_or(opt::MAX_VALUE_LENGTH);
    if value.len() > max {
      return Err(WriteError::OptionValueTooLong { number,
                                                  actual: value.len(),
                                                  max });
    }

    self.insert_option_bytes(number, value)
  }

  /// Sorted insert without the per-number length check; duplication of a
  /// parsed message must carry options we would refuse to compose.
  fn insert_option_bytes(&mut self, number: OptNumber, value: &[u8]) -> Result<usize, WriteError> {
    let succ = {
      let mut it = self.entries();
      it.find(|e| e.number > number.0)
    };

    let prev = succ.map(|e| e.prev).unwrap_or(self.max_opt.0);
    let delta = number.0 - prev;

    let mut bytes = opt::header_bytes(delta, value.len()).to_vec();
    bytes.extend_from_slice(value);

    match succ {
      | Some(e) => {
        // shrinks or keeps the successor header; its delta only decreases
        let succ_hdr = opt::header_bytes(e.number - number.0, e.hdr.value_len);
        let shrink = e.hdr.header_len - succ_hdr.len();

        self.buf.fits(self.buf.used() + bytes.len() - shrink)?;
        self.buf.replace(e.off, e.hdr.header_len, &succ_hdr)?;
        self.buf.insert(e.off, &bytes)?;
        self.opts_end += bytes.len() - shrink;
      },
      | None => {
        self.buf.insert(self.opts_end, &bytes)?;
        self.opts_end += bytes.len();
        self.max_opt = number;
      },
    }

    self.hdr_size = 0;
    Ok(bytes.len())
  }

  /// Remove the first option with this number, re-encoding the
  /// successor's delta. Whether anything was removed.
  pub fn remove_option_first(&mut self, number: OptNumber) -> bool {
    let (target, succ) = {
      let mut it = self.entries();
      match it.find(|e| e.number == number.0) {
        | Some(t) => {
          let succ = it.next();
          (t, succ)
        },
        | None => return false,
      }
    };

    let target_len = target.hdr.header_len + target.hdr.value_len;

    match succ {
      | Some(e) => {
        let succ_hdr = opt::header_bytes(e.number - target.prev, e.hdr.value_len);
        let old_region = target_len + e.hdr.header_len;
        self.buf.replace_unchecked(target.off, old_region, &succ_hdr);
        self.opts_end -= old_region - succ_hdr.len();
      },
      | None => {
        self.buf.remove(target.off, target_len);
        self.opts_end -= target_len;
      },
    }

    self.max_opt = {
      let last = self.entries().last();
      last.map(|e| OptNumber(e.number)).unwrap_or(OptNumber(0))
    };
    self.hdr_size = 0;
    true
  }

  /// Remove every option with this number. How many were removed.
  pub fn remove_option_all(&mut self, number: OptNumber) -> usize {
    let mut removed = 0;
    while self.remove_option_first(number) {
      removed += 1;
    }
    removed
  }

  /// Replace the value of the first option with this number in place.
  /// The option keeps its position; only the length is re-encoded.
  /// Returns the option's new encoded size.
  pub fn update_option(&mut self, number: OptNumber, value: &[u8]) -> Result<usize, WriteError> {
    let max = number.value_len_max().unwrap_or(opt::MAX_VALUE_LENGTH);
    if value.len() > max {
      return Err(WriteError::OptionValueTooLong { number,
                                                  actual: value.len(),
                                                  max });
    }

    let target = {
      let mut it = self.entries();
      it.find(|e| e.number == number.0)
    };
    let target = target.ok_or(WriteError::OptionNotFound(number))?;

    let mut bytes = opt::header_bytes(target.hdr.delta, value.len()).to_vec();
    bytes.extend_from_slice(value);

    let old_len = target.hdr.header_len + target.hdr.value_len;
    self.buf.replace(target.off, old_len, &bytes)?;
    self.opts_end = self.opts_end + bytes.len() - old_len;
    self.hdr_size = 0;
    Ok(bytes.len())
  }

  /// The first option with this number, if present
  pub fn get_option(&self, number: OptNumber) -> Option<&[u8]> {
    self.options().find(|(n, _)| *n == number).map(|(_, v)| v)
  }

  /// All options in wire (ascending number) order
  pub fn options(&self) -> OptIter<'_> {
    OptIter::new(&self.buf.body()[self.token_len..self.opts_end])
  }

  /// Append the payload marker and payload. May be done once per
  /// lifecycle; compose the payload fully before setting it.
  ///
  /// An empty `payload` is a no-op (the marker promises at least one
  /// byte, so none is written).
  pub fn set_payload(&mut self, payload: &[u8]) -> Result<(), WriteError> {
    if payload.is_empty() {
      return Ok(());
    }

    if self.buf.used() > self.opts_end {
      return Err(WriteError::PayloadAlreadySet);
    }

    self.buf.fits(self.buf.used() + 1 + payload.len())?;
    self.buf.append(&[PAYLOAD_MARKER])?;
    self.buf.append(payload)?;
    self.hdr_size = 0;
    Ok(())
  }

  /// The payload bytes carried by this message, if any
  pub fn payload(&self) -> Option<&[u8]> {
    (self.buf.used() > self.opts_end).then(|| &self.buf.body()[self.opts_end + 1..])
  }

  /// The message body, preferring an attached [`BodyView`] (the whole
  /// reassembled body) over the message's own payload (one block of it).
  pub fn payload_view(&self) -> Option<Body<'_>> {
    if let Some(view) = &self.body_view {
      return Some(Body { data: &view.data,
                         offset: view.offset,
                         total: view.total });
    }

    self.payload().map(|data| Body { data,
                                     offset: 0,
                                     total: data.len() })
  }

  /// Attach a reassembled body to this message
  pub fn set_body_view(&mut self, view: BodyView) {
    self.body_view = Some(view);
  }

  /// Detach the reassembled body, if one was attached
  pub fn clear_body_view(&mut self) -> Option<BodyView> {
    self.body_view.take()
  }

  /// Copy this message under a new token: type, code and id are kept,
  /// options are copied except those in `drop_options`, and the payload
  /// is not copied.
  pub fn duplicate(&self, token: &[u8], drop_options: &[OptNumber]) -> Result<Pdu, WriteError> {
    let mut out = Pdu::new(self.ty, self.code, self.id, self.buf.used());
    out.buf.set_max(self.buf.max());
    out.set_token(token)?;

    for (number, value) in self.options() {
      if drop_options.contains(&number) {
        continue;
      }
      out.insert_option_bytes(number, value)?;
    }

    Ok(out)
  }

  /// Reset to an empty message for reuse, keeping the allocation and
  /// the size ceiling
  pub fn clear(&mut self, size_hint: usize) {
    let max = self.buf.max();
    self.buf.clear(size_hint, max);
    self.token_len = 0;
    self.opts_end = 0;
    self.max_opt = OptNumber(0);
    self.hdr_size = 0;
    self.body_view = None;
  }

  /// Fill the reservation ahead of the token with this transport's
  /// header. Call once the message is final; any later mutation makes
  /// the written header stale.
  ///
  /// Returns the header's size in bytes.
  pub fn encode_header(&mut self, proto: Proto) -> Result<usize, EncodeError> {
    let len_after_token = self.buf.used() - self.token_len;
    let hdr = frame::encode_header(proto,
                                   self.ty,
                                   self.code,
                                   self.id,
                                   self.token_len as u8,
                                   len_after_token);
    self.hdr_size = self.buf.write_hdr(&hdr)?;
    Ok(self.hdr_size)
  }

  /// The wire form: the header written by the last
  /// [`Pdu::encode_header`] followed by the body. Just the body if no
  /// header has been encoded since the last mutation.
  pub fn as_bytes(&self) -> &[u8] {
    self.buf.framed(self.hdr_size)
  }

  /// Frame for `proto` and yield the wire form in one step
  pub fn to_bytes(&mut self, proto: Proto) -> Result<&[u8], EncodeError> {
    self.encode_header(proto)?;
    Ok(self.as_bytes())
  }

  /// Parse one message from `data`.
  ///
  /// For datagram transports `data` is exactly one datagram. For stream
  /// transports the caller has already buffered
  /// [`frame::parse_size`] bytes; anything past that length is ignored
  /// here and belongs to the next message.
  ///
  /// The resulting message is growable regardless of how the original
  /// sender capped theirs.
  pub fn parse(proto: Proto, data: &[u8]) -> Result<Pdu, MessageParseError> {
    let hdr_size = frame::parse_header_size(proto, data)?;
    let size = frame::parse_size(proto, data)?;

    if data.len() < size {
      return Err(MessageParseError::eof());
    }

    let hdr = frame::decode_header(proto, data)?;
    let token_len = hdr.tkl as usize;

    if token_len > MAX_TOKEN_LENGTH || hdr_size + token_len > size {
      return Err(MessageParseError::InvalidTokenLength(hdr.tkl));
    }

    let body = &data[hdr_size..size];
    let mut pdu = Pdu { ty: hdr.ty,
                        ver: Version::default(),
                        code: hdr.code,
                        id: hdr.id,
                        buf: Buffer::new(MAX_HEADER_SIZE, body.len(), 0),
                        token_len,
                        opts_end: token_len,
                        max_opt: OptNumber(0),
                        hdr_size: 0,
                        body_view: None };
    pdu.buf.fill(body);
    pdu.parse_opts()?;

    if pdu.code == Code::EMPTY && pdu.buf.used() > 0 {
      return Err(MessageParseError::UnexpectedDataInEmptyMessage);
    }

    Ok(pdu)
  }

  /// Validate the option region and locate the payload marker, walking
  /// the body linearly from just after the token.
  fn parse_opts(&mut self) -> Result<(), OptParseError> {
    let body = self.buf.body();
    let mut off = self.token_len;
    let mut number: u32 = 0;

    while off < body.len() {
      if body[off] == PAYLOAD_MARKER {
        if off + 1 == body.len() {
          return Err(OptParseError::PayloadMarkerWithoutPayload);
        }
        break;
      }

      let hdr = opt::decode_header(body, off)?;
      number += hdr.delta as u32;
      if number > opt::MAX_OPT_NUMBER as u32 {
        return Err(OptParseError::OptionNumberTooBig(number));
      }

      off += hdr.header_len + hdr.value_len;
    }

    self.opts_end = off;
    self.max_opt = OptNumber(number as u16);
    Ok(())
  }

  /// Walk the (maintained-valid) option region with offsets, for the
  /// mutators. Numbers are absolute; `prev` is the predecessor's.
  fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
    let body = self.buf.body();
    let end = self.opts_end;
    let mut off = self.token_len;
    let mut prev: u16 = 0;

    core::iter::from_fn(move || {
      if off >= end {
        return None;
      }

      let hdr = opt::decode_header(body, off).ok()?;
      let number = prev.checked_add(hdr.delta)?;
      let entry = Entry { prev,
                          number,
                          off,
                          hdr };
      prev = number;
      off += hdr.header_len + hdr.value_len;
      Some(entry)
    })
  }
}
