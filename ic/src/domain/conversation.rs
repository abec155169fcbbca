//! ConversationState - the accumulating record of one negotiation

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::service::{IdentifiedService, ValidatedSelection};

/// Record of the negotiation so far
///
/// Owned by the workflow controller. Fields are replaced wholesale by
/// transitions; nothing edits them in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Text of the request that started the negotiation
    pub original_request: String,

    /// Chosen candidate per service, accumulated across rounds
    pub validated: ValidatedSelection,

    /// Services from the most recent decomposition or clarification
    pub identified_services: Vec<IdentifiedService>,

    /// Append-only log of interactions, passed verbatim as context
    pub history: Vec<String>,
}

impl ConversationState {
    /// History with `entries` appended, as a new value
    pub fn history_with(&self, entries: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut history = self.history.clone();
        history.extend(entries);
        debug!(len = history.len(), "ConversationState::history_with: called");
        history
    }

    /// Names of validated services, in key order
    pub fn validated_names(&self) -> Vec<String> {
        self.validated.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
