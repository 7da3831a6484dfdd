//! Ember Core - Foundational types for Ember
//!
//! This crate provides the types that all other Ember crates depend on:
//! - `EmberError` and the `Result` alias
//! - `Listeners` / `Subscription` - synchronous change notification
//! - `CancelToken` - cooperative cancellation with interruptible waits
//! - `Clock` - real and virtual time sources for polling loops
//! - Identifier helpers

mod cancel;
mod clock;
mod error;
mod id;
mod notify;

pub use cancel::CancelToken;
pub use clock::{now_millis, now_utc, Clock, ManualClock, SystemClock};
pub use error::{truncate_snapshot, EmberError, Result};
pub use id::{job_id, prefixed_id};
pub use notify::{Listener, Listeners, Subscription};
