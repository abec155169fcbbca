//! Domain types for the intent composer
//!
//! Services and candidates produced by decomposition, the conversation
//! record owned by the workflow, and the final intent document.

mod conversation;
mod intent;
mod service;

pub use conversation::ConversationState;
pub use intent::{FinalIntent, export_intent};
pub use service::{
    CandidateCatalog, DependencyRef, IdentifiedService, Picks, ServiceCandidate, ValidatedSelection, find_candidate,
    service_names,
};
