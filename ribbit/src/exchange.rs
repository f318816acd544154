//! Requests whose responses are deliberately delayed.
//!
//! When a server cannot answer a request right away it acks the request
//! empty-handed and sends the real response later, under the same token
//! ([RFC7252 §5.2.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.2.2)).
//! [`Exchanges`] is the bookkeeping for that: each registered [`Exchange`]
//! owns a copy of the request and an optional fire time.
//!
//! Nothing here sleeps, spawns or retransmits. The owner drives the
//! registry by reading the clock and polling [`Exchange::is_ready`];
//! what "session" means is also the owner's business (`S` is opaque, the
//! registry only compares sessions by identity).

use std::any::Any;
use std::sync::Arc;

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use ribbit_msg::{CodeKind, Id, Pdu, WriteError};

use crate::time::{Clock, Millis};

/// Why [`Exchanges::register`] refused a registration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterError {
  /// Only requests (codes 0.01 through 0.31) may be answered late
  NotARequest,

  /// This session already has an exchange under this message id
  AlreadyRegistered(Id),

  /// Copying the request into the registry failed
  Copy(WriteError),

  /// The clock could not produce a timestamp
  Clock,
}

impl From<WriteError> for RegisterError {
  fn from(e: WriteError) -> Self {
    Self::Copy(e)
  }
}

/// One request waiting for its real response.
///
/// Owns a full copy of the request (token, options, payload and message
/// id all preserved) so the original receive buffer may be reused, and
/// holds the session alive until the exchange is released or the whole
/// registry is dropped.
pub struct Exchange<S, C: Clock> {
  session: Arc<S>,
  request: Pdu,
  fire_time: Option<Instant<C>>,
  app_data: Option<Box<dyn Any>>,
}

impl<S, C: Clock> core::fmt::Debug for Exchange<S, C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let fire = self.fire_time
                   .and_then(|t| Millis::try_from(t.duration_since_epoch()).ok());

    f.debug_struct("Exchange")
     .field("id", &self.request.id())
     .field("token", &self.request.token())
     .field("fire_time_ms", &fire.map(|Milliseconds(ms)| ms))
     .field("has_app_data", &self.app_data.is_some())
     .finish()
  }
}

impl<S, C: Clock> Exchange<S, C> {
  /// The session this exchange belongs to
  pub fn session(&self) -> &Arc<S> {
    &self.session
  }

  /// The registry's copy of the request
  pub fn request(&self) -> &Pdu {
    &self.request
  }

  /// When this exchange is due, if a delay was given
  pub fn fire_time(&self) -> Option<Instant<C>> {
    self.fire_time
  }

  /// Whether the exchange is due at `now`. An exchange with no fire
  /// time is always due; it fires whenever the owner next looks.
  pub fn is_ready(&self, now: Instant<C>) -> bool {
    self.fire_time.map_or(true, |t| now >= t)
  }

  /// Re-arm (or, with a zero delay, disarm) the fire time, counting
  /// from `now`
  pub fn set_delay(&mut self, now: Instant<C>, delay: Millis) {
    self.fire_time = arm(now, delay);
  }

  /// Caller-owned state riding along with the exchange
  pub fn app_data(&self) -> Option<&dyn Any> {
    self.app_data.as_deref()
  }

  /// Attach caller state, handing back whatever was attached before
  pub fn set_app_data(&mut self, data: Option<Box<dyn Any>>) -> Option<Box<dyn Any>> {
    core::mem::replace(&mut self.app_data, data)
  }
}

/// The registry of open exchanges.
///
/// A plain owned collection; population is expected to stay small (one
/// entry per in-flight delayed response), so lookups are linear scans.
pub struct Exchanges<S, C: Clock> {
  clock: C,
  live: Vec<Exchange<S, C>>,
}

impl<S, C: Clock> core::fmt::Debug for Exchanges<S, C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Exchanges").field("live", &self.live).finish()
  }
}

impl<S, C: Clock> Exchanges<S, C> {
  /// Create an empty registry around a tick source
  pub fn new(clock: C) -> Self {
    Self { clock,
           live: Vec::new() }
  }

  /// How many exchanges are open
  pub fn len(&self) -> usize {
    self.live.len()
  }

  /// Whether no exchanges are open
  pub fn is_empty(&self) -> bool {
    self.live.is_empty()
  }

  /// Read the registry's clock, for driving [`Exchange::is_ready`] and
  /// [`Exchange::set_delay`]
  pub fn now(&self) -> Result<Instant<C>, embedded_time::clock::Error> {
    self.clock.try_now()
  }

  /// Open an exchange for `request` on `session`, due `delay` from now
  /// (a zero delay means due immediately).
  ///
  /// The request is copied in full, so the caller's buffer is free to be
  /// reused the moment this returns. One session may not hold two
  /// exchanges under the same message id.
  pub fn register(&mut self,
                  session: &Arc<S>,
                  request: &Pdu,
                  delay: Millis)
                  -> Result<&mut Exchange<S, C>, RegisterError> {
    if request.code().kind() != CodeKind::Request {
      return Err(RegisterError::NotARequest);
    }

    let id = request.id();
    if self.live
           .iter()
           .any(|x| Arc::ptr_eq(&x.session, session) && x.request.id() == id)
    {
      log::debug!("refusing duplicate exchange for mid {}", id.0);
      return Err(RegisterError::AlreadyRegistered(id));
    }

    let mut copy = request.duplicate(request.token().as_ref(), &[])?;
    if let Some(payload) = request.payload() {
      copy.set_payload(payload)?;
    }

    let now = self.clock.try_now().map_err(|_| RegisterError::Clock)?;
    let fire_time = arm(now, delay);

    self.live.push(Exchange { session: Arc::clone(session),
                              request: copy,
                              fire_time,
                              app_data: None });

    let at = self.live.len() - 1;
    Ok(&mut self.live[at])
  }

  /// The exchange `session` holds under `id`, if any
  pub fn find(&mut self, session: &Arc<S>, id: Id) -> Option<&mut Exchange<S, C>> {
    self.live
        .iter_mut()
        .find(|x| Arc::ptr_eq(&x.session, session) && x.request.id() == id)
  }

  /// Close the exchange `session` holds under `id`, detaching and
  /// returning it. Dropping the returned exchange releases its hold on
  /// the session and frees the request copy.
  pub fn release(&mut self, session: &Arc<S>, id: Id) -> Option<Exchange<S, C>> {
    self.live
        .iter()
        .position(|x| Arc::ptr_eq(&x.session, session) && x.request.id() == id)
        .map(|at| self.live.remove(at))
  }

  /// Close every open exchange
  pub fn release_all(&mut self) {
    self.live.clear();
  }
}

/// A zero delay means no fire time; the exchange is due whenever the
/// owner next looks
fn arm<C: Clock>(now: Instant<C>, delay: Millis) -> Option<Instant<C>> {
  if delay.0 > 0 {
    now.checked_add(delay)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;
  use std::rc::Rc;

  use embedded_time::rate::Fraction;
  use ribbit_msg::{Code, OptNumber, Type};

  use super::*;

  #[derive(Clone, Debug)]
  struct FakeClock(Rc<Cell<u64>>);

  impl embedded_time::Clock for FakeClock {
    type T = u64;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

    fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
      Ok(Instant::new(self.0.get()))
    }
  }

  struct Session {
    #[allow(dead_code)]
    addr: &'static str,
  }

  fn setup() -> (Rc<Cell<u64>>, Exchanges<Session, FakeClock>, Arc<Session>) {
    let time = Rc::new(Cell::new(0u64));
    let exchanges = Exchanges::new(FakeClock(Rc::clone(&time)));
    let session = Arc::new(Session { addr: "[::1]:5683" });
    (time, exchanges, session)
  }

  fn request(id: u16) -> Pdu {
    let mut req = Pdu::new(Type::Con, Code::GET, Id(id), 64);
    req.set_token(&[id as u8]).unwrap();
    req.add_option(OptNumber::URI_PATH, b"sensors").unwrap();
    req.set_payload(b"query").unwrap();
    req
  }

  #[test]
  fn only_requests_accepted() {
    let (_, mut exchanges, session) = setup();

    let mut response = request(1);
    response.set_code(Code::new(2, 5));
    assert_eq!(exchanges.register(&session, &response, Milliseconds(0))
                        .err()
                        .unwrap(),
               RegisterError::NotARequest);

    let mut empty = request(1);
    empty.clear(0);
    empty.set_code(Code::EMPTY);
    assert_eq!(exchanges.register(&session, &empty, Milliseconds(0))
                        .err()
                        .unwrap(),
               RegisterError::NotARequest);

    assert!(exchanges.register(&session, &request(1), Milliseconds(0)).is_ok());
  }

  #[test]
  fn one_exchange_per_session_and_mid() {
    let (_, mut exchanges, session) = setup();
    exchanges.register(&session, &request(7), Milliseconds(0)).unwrap();

    assert_eq!(exchanges.register(&session, &request(7), Milliseconds(0))
                        .err()
                        .unwrap(),
               RegisterError::AlreadyRegistered(Id(7)));

    // same mid on another session is a different exchange
    let other = Arc::new(Session { addr: "[::2]:5683" });
    assert!(exchanges.register(&other, &request(7), Milliseconds(0)).is_ok());
    assert!(exchanges.register(&session, &request(8), Milliseconds(0)).is_ok());
    assert_eq!(exchanges.len(), 3);
  }

  #[test]
  fn request_copied_in_full_and_independent() {
    let (_, mut exchanges, session) = setup();
    let mut req = request(3);
    exchanges.register(&session, &req, Milliseconds(0)).unwrap();

    {
      let held = exchanges.find(&session, Id(3)).unwrap().request();
      assert_eq!(held.id(), req.id());
      assert_eq!(held.token(), req.token());
      assert_eq!(held.get_option(OptNumber::URI_PATH),
                 Some(b"sensors".as_ref()));
      assert_eq!(held.payload(), Some(b"query".as_ref()));
    }

    // wrecking the original leaves the registry's copy alone
    req.set_token(&[0xFF; 8]).unwrap();
    drop(req);

    let held = exchanges.find(&session, Id(3)).unwrap().request();
    assert_eq!(held.token().as_ref(), [3u8].as_ref());
    assert_eq!(held.get_option(OptNumber::URI_PATH),
               Some(b"sensors".as_ref()));
    assert_eq!(held.payload(), Some(b"query".as_ref()));
  }

  #[test]
  fn delay_decides_readiness() {
    let (time, mut exchanges, session) = setup();
    exchanges.register(&session, &request(1), Milliseconds(1000))
             .unwrap();
    exchanges.register(&session, &request(2), Milliseconds(0)).unwrap();

    time.set(999);
    let now = exchanges.now().unwrap();
    assert!(!exchanges.find(&session, Id(1)).unwrap().is_ready(now));
    assert!(exchanges.find(&session, Id(2)).unwrap().is_ready(now));

    time.set(1000);
    let now = exchanges.now().unwrap();
    assert!(exchanges.find(&session, Id(1)).unwrap().is_ready(now));
  }

  #[test]
  fn set_delay_rearms_and_disarms() {
    let (time, mut exchanges, session) = setup();
    exchanges.register(&session, &request(1), Milliseconds(500)).unwrap();

    time.set(100);
    let now = exchanges.now().unwrap();
    let exchange = exchanges.find(&session, Id(1)).unwrap();

    exchange.set_delay(now, Milliseconds(900));
    assert!(!exchange.is_ready(now));

    time.set(999);
    assert!(!exchange.is_ready(Instant::new(999)));
    assert!(exchange.is_ready(Instant::new(1000)));

    exchange.set_delay(Instant::new(1000), Milliseconds(0));
    assert_eq!(exchange.fire_time(), None);
    assert!(exchange.is_ready(Instant::new(1000)));
  }

  #[test]
  fn release_detaches_and_frees_the_session() {
    let (_, mut exchanges, session) = setup();
    exchanges.register(&session, &request(1), Milliseconds(0)).unwrap();
    exchanges.register(&session, &request(2), Milliseconds(0)).unwrap();
    assert_eq!(Arc::strong_count(&session), 3);

    let released = exchanges.release(&session, Id(1)).unwrap();
    assert_eq!(released.request().id(), Id(1));
    drop(released);
    assert_eq!(Arc::strong_count(&session), 2);

    assert!(exchanges.release(&session, Id(1)).is_none());
    assert!(exchanges.find(&session, Id(2)).is_some());
  }

  #[test]
  fn release_all_empties_the_registry() {
    let (_, mut exchanges, session) = setup();
    exchanges.register(&session, &request(1), Milliseconds(0)).unwrap();
    exchanges.register(&session, &request(2), Milliseconds(0)).unwrap();

    exchanges.release_all();
    assert!(exchanges.is_empty());
    assert_eq!(Arc::strong_count(&session), 1);
  }

  #[test]
  fn app_data_rides_along() {
    let (_, mut exchanges, session) = setup();
    let exchange = exchanges.register(&session, &request(1), Milliseconds(0))
                            .unwrap();

    assert!(exchange.set_app_data(Some(Box::new(42u32))).is_none());
    let old = exchange.set_app_data(Some(Box::new("state")));
    assert_eq!(old.unwrap().downcast_ref::<u32>(), Some(&42));

    let held = exchanges.find(&session, Id(1)).unwrap();
    assert_eq!(held.app_data().and_then(|d| d.downcast_ref::<&str>()),
               Some(&"state"));
  }
}
