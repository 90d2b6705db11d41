//! Serialize asynchronous requests per origin.
//!
//! # Overview
//!
//! The core of the module is the [Engine]. It is responsible for:
//! - Accepting operations from the application and ordering them per origin
//! - Driving the head operation of every non-empty origin to completion
//! - Settling each caller with its operation's own output
//! - Publishing the pending count and resolving snapshot barriers
//!
//! # Details
//!
//! The engine keeps one queue per origin. Operations submitted for the same
//! origin settle strictly in submission order: an operation starts only once
//! everything enqueued before it for that origin has settled, success and
//! failure alike. Operations for distinct origins are independent and
//! interleave freely. Scheduling is cooperative: operations execute inside
//! the engine task, so the ordering invariant holds without locks.
//!
//! The [Mailbox] is used to make requests to the [Engine]. Submitting an
//! operation returns a receiver that resolves with the operation's own
//! output exactly when it settles; the queue never inspects or transforms
//! that output. The mailbox also reports whether an origin is busy, exposes
//! the global pending count (published to subscribers after every enqueue
//! and settle), and can arm a snapshot barrier that resolves once every
//! operation enqueued before it has settled.

mod config;
pub use config::Config;
mod engine;
pub use engine::Engine;
mod ingress;
pub use ingress::{Mailbox, Message, Operation};
mod metrics;

#[cfg(test)]
pub mod mocks;

use thiserror::Error;

/// Errors that can occur when interacting with a [Mailbox].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The engine has shut down and can no longer accept work.
    #[error("closed")]
    Closed,
}
