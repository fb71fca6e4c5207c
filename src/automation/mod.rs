// src/automation/mod.rs

//! The automation capability a worker drives.
//!
//! The worker never talks to a browser directly. It only needs four
//! operations, captured by the [`Automation`] trait:
//!
//! - render the current login token (may time out),
//! - ask whether the token has been consumed (scanned),
//! - enumerate work units,
//! - extract the records of one work unit.
//!
//! Both sequences are pull-based ([`Sequence`]): the worker stops pulling once
//! it reaches its limit, so an implementation never needs to know the limit.
//!
//! - [`command`] provides [`CommandAutomation`], which delegates every
//!   operation to an external bridge program.
//! - Tests provide scripted implementations (see `harvest-test-utils`).

pub mod command;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::errors::Result;
use crate::types::WorkUnit;

pub use command::CommandAutomation;

/// Boxed future returned by the automation traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A lazy, fallible sequence whose items are produced on demand.
///
/// Dropping a sequence before it is exhausted must stop whatever produces it.
pub trait Sequence<T>: Send {
    /// The next item, or `None` once the sequence is exhausted.
    fn next(&mut self) -> BoxFuture<'_, Option<Result<T>>>;
}

/// Lazy sequence of work units. Owns its state, so the session stays usable
/// while the sequence is being consumed.
pub type WorkUnits = Box<dyn Sequence<WorkUnit>>;

/// Lazy sequence of structured records extracted from one work unit.
pub type Records = Box<dyn Sequence<Value>>;

/// One automation session, exclusively owned by a worker for its lifetime.
pub trait Automation: Send {
    /// Render the login token the user has to acknowledge.
    ///
    /// A stall is reported as `HarvestError::Timeout`.
    fn render_login_token(&mut self) -> BoxFuture<'_, Result<String>>;

    /// Whether the login token has been consumed and extraction may begin.
    fn is_login_consumed(&mut self) -> BoxFuture<'_, Result<bool>>;

    /// Enumerate work units. The sequence may be unbounded.
    fn work_units(&mut self) -> BoxFuture<'_, Result<WorkUnits>>;

    /// Extract all records belonging to `unit`.
    fn extract_records<'a>(&'a mut self, unit: &'a WorkUnit) -> BoxFuture<'a, Result<Records>>;
}

/// Adapts an in-memory iterator into a [`Sequence`].
pub struct IterSequence<I> {
    iter: I,
}

impl<I> IterSequence<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<T, I> Sequence<T> for IterSequence<I>
where
    T: Send + 'static,
    I: Iterator<Item = Result<T>> + Send,
{
    fn next(&mut self) -> BoxFuture<'_, Option<Result<T>>> {
        let item = self.iter.next();
        Box::pin(async move { item })
    }
}
