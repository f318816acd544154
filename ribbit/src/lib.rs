//! The messaging-context side of `ribbit`: the pieces that sit between
//! the PDU engine ([`ribbit_msg`]) and a transport.
//!
//! The centerpiece is [`exchange::Exchanges`], a registry of requests
//! whose responses are deliberately delayed (a "separate response" in
//! [RFC7252 §5.2.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.2.2)
//! terms). The registry never sleeps or spawns anything; the owner feeds
//! it clock readings and asks which exchanges are due.

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![deny(missing_docs)]

/// The asynchronous exchange registry
pub mod exchange;

/// Clock and duration glue
pub mod time;

#[doc(inline)]
pub use exchange::*;
#[doc(inline)]
pub use time::*;
