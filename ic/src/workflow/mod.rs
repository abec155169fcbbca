//! Negotiation workflow
//!
//! The [`Controller`] is a synchronous state machine that owns the
//! conversation; the [`Negotiator`] drives it through a [`Gateway`](crate::gateway::Gateway).
//! Selection logic shared by both lives in [`reducer`].

mod controller;
mod error;
mod negotiator;
pub mod reducer;
mod state;

#[cfg(test)]
mod fixtures;

pub use controller::{ClassifyOutcome, Controller, Pending, Settled, Ticket, ValidateOutcome};
pub use error::{RequestError, WorkflowError};
pub use negotiator::Negotiator;
pub use state::Step;
