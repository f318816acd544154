use crate::frame::EncodeError;
use crate::pdu::WriteError;

/// Owned contiguous storage for one PDU.
///
/// Two logical regions: a fixed header reservation, then the body
/// (token, options, payload marker, payload). Body positions are always
/// expressed relative to the body start, so growth never invalidates an
/// offset a caller is holding.
///
/// The allocation never shrinks; [`Buffer::clear`] only resets the used
/// length.
#[derive(Clone, Debug)]
pub(crate) struct Buffer {
  bytes: Vec<u8>,
  hdr_reserve: usize,
  max: usize, // body size ceiling; 0 means growable
}

impl Buffer {
  pub(crate) fn new(hdr_reserve: usize, size_hint: usize, max: usize) -> Self {
    let mut bytes = Vec::with_capacity(hdr_reserve + size_hint);
    bytes.resize(hdr_reserve, 0);
    Self { bytes,
           hdr_reserve,
           max }
  }

  /// Bytes of body currently in use
  pub(crate) fn used(&self) -> usize {
    self.bytes.len() - self.hdr_reserve
  }

  pub(crate) fn max(&self) -> usize {
    self.max
  }

  pub(crate) fn set_max(&mut self, max: usize) {
    self.max = max;
  }

  /// Body bytes the allocation could hold without growing
  pub(crate) fn capacity(&self) -> usize {
    self.bytes.capacity() - self.hdr_reserve
  }

  /// Refuse any mutation that would take the body past the ceiling.
  /// Checked before bytes move, so a failed mutation leaves `used`
  /// untouched.
  pub(crate) fn fits(&self, new_used: usize) -> Result<(), WriteError> {
    if self.max != 0 && new_used > self.max {
      return Err(WriteError::CapacityExceeded { required: new_used,
                                                max: self.max });
    }
    Ok(())
  }

  pub(crate) fn append(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
    self.fits(self.used() + bytes.len())?;
    self.bytes.extend_from_slice(bytes);
    Ok(())
  }

  pub(crate) fn insert(&mut self, at: usize, bytes: &[u8]) -> Result<(), WriteError> {
    self.fits(self.used() + bytes.len())?;
    let pos = self.hdr_reserve + at;
    self.bytes.splice(pos..pos, bytes.iter().copied());
    Ok(())
  }

  pub(crate) fn replace(&mut self,
                        at: usize,
                        old_len: usize,
                        bytes: &[u8])
                        -> Result<(), WriteError> {
    self.fits(self.used() - old_len + bytes.len())?;
    let pos = self.hdr_reserve + at;
    self.bytes.splice(pos..pos + old_len, bytes.iter().copied());
    Ok(())
  }

  /// Replace without consulting the ceiling. Only for rewrites that
  /// cannot grow the body, e.g. dropping an option and re-encoding its
  /// successor's delta.
  pub(crate) fn replace_unchecked(&mut self, at: usize, old_len: usize, bytes: &[u8]) {
    debug_assert!(bytes.len() <= old_len);
    let pos = self.hdr_reserve + at;
    self.bytes.splice(pos..pos + old_len, bytes.iter().copied());
  }

  pub(crate) fn remove(&mut self, at: usize, len: usize) {
    let pos = self.hdr_reserve + at;
    self.bytes.drain(pos..pos + len);
  }

  pub(crate) fn truncate_body(&mut self, body_len: usize) {
    self.bytes.truncate(self.hdr_reserve + body_len);
  }

  /// Reset the body to empty and adopt a new ceiling. The allocation is
  /// kept.
  pub(crate) fn clear(&mut self, size_hint: usize, max: usize) {
    self.bytes.truncate(self.hdr_reserve);
    if size_hint > self.capacity() {
      self.bytes.reserve(size_hint - self.capacity());
    }
    self.max = max;
  }

  /// Copy raw body bytes in (parse path; the ceiling is not consulted)
  pub(crate) fn fill(&mut self, bytes: &[u8]) {
    debug_assert!(self.max == 0);
    self.bytes.extend_from_slice(bytes);
  }

  pub(crate) fn body(&self) -> &[u8] {
    &self.bytes[self.hdr_reserve..]
  }

  /// Fill the `hdr.len()` bytes immediately ahead of the token.
  /// Fails only when the reservation was too small for this transport.
  pub(crate) fn write_hdr(&mut self, hdr: &[u8]) -> Result<usize, EncodeError> {
    if hdr.len() > self.hdr_reserve {
      return Err(EncodeError::HeaderSpaceExceeded { need: hdr.len(),
                                                    reserved: self.hdr_reserve });
    }
    let start = self.hdr_reserve - hdr.len();
    self.bytes[start..self.hdr_reserve].copy_from_slice(hdr);
    Ok(hdr.len())
  }

  /// Header (last `hdr_size` reserved bytes) plus body: the wire form
  pub(crate) fn framed(&self, hdr_size: usize) -> &[u8] {
    &self.bytes[self.hdr_reserve - hdr_size..]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ceiling_blocks_growth_and_preserves_used() {
    let mut buf = Buffer::new(4, 8, 4);
    buf.append(&[1, 2, 3]).unwrap();

    assert_eq!(buf.append(&[4, 5]),
               Err(WriteError::CapacityExceeded { required: 5, max: 4 }));
    assert_eq!(buf.used(), 3);
    assert_eq!(buf.body(), &[1, 2, 3]);

    buf.append(&[4]).unwrap();
    assert_eq!(buf.used(), 4);
  }

  #[test]
  fn insert_and_replace_keep_relative_offsets() {
    let mut buf = Buffer::new(4, 0, 0);
    buf.append(&[10, 30]).unwrap();
    buf.insert(1, &[20]).unwrap();
    assert_eq!(buf.body(), &[10, 20, 30]);

    buf.replace(1, 1, &[21, 22]).unwrap();
    assert_eq!(buf.body(), &[10, 21, 22, 30]);

    buf.remove(0, 1);
    assert_eq!(buf.body(), &[21, 22, 30]);
  }

  #[test]
  fn growth_spans_reallocation() {
    let mut buf = Buffer::new(4, 2, 0);
    let big = vec![0xABu8; 4096];
    buf.append(&big).unwrap();
    assert_eq!(buf.used(), 4096);
    assert_eq!(buf.body(), &big[..]);
  }

  #[test]
  fn header_written_flush_against_token() {
    let mut buf = Buffer::new(6, 0, 0);
    buf.append(&[0xEE]).unwrap();

    assert_eq!(buf.write_hdr(&[1, 2, 3, 4]), Ok(4));
    assert_eq!(buf.framed(4), &[1, 2, 3, 4, 0xEE]);

    assert_eq!(buf.write_hdr(&[0; 7]),
               Err(EncodeError::HeaderSpaceExceeded { need: 7, reserved: 6 }));
  }

  #[test]
  fn clear_resets_used_keeps_allocation() {
    let mut buf = Buffer::new(4, 16, 0);
    buf.append(&[1; 16]).unwrap();
    let cap = buf.capacity();

    buf.clear(0, 8);
    assert_eq!(buf.used(), 0);
    assert_eq!(buf.max(), 8);
    assert!(buf.capacity() >= cap);
  }
}
