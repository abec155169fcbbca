//! Workflow steps
//!
//! Each step carries exactly the data valid in it, so combinations such as
//! validating without a catalog cannot be represented.

use std::fmt;

use crate::domain::{CandidateCatalog, FinalIntent, Picks};
use crate::gateway::RequestKind;

/// Current position in the negotiation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Step {
    /// Waiting for a request
    #[default]
    Input,

    /// Request was a greeting or off-topic; only reset leaves this step
    ClassifiedNonTelecom { kind: RequestKind, message: String },

    /// User is picking candidates for the current round
    AwaitingValidation { catalog: CandidateCatalog, picks: Picks },

    /// Some services are unresolved; user may clarify, ask for alternatives or finish
    AwaitingClarificationOrAlternatives {
        catalog: CandidateCatalog,
        /// Current-round services without a validated candidate
        refused: Vec<String>,
        /// Latest suggestions from the alternatives service, display only
        alternatives: Vec<String>,
    },

    /// Intent generated
    IntentReady { intent: FinalIntent },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Input => "INPUT",
            Step::ClassifiedNonTelecom { .. } => "CLASSIFIED_NON_TELECOM",
            Step::AwaitingValidation { .. } => "AWAITING_VALIDATION",
            Step::AwaitingClarificationOrAlternatives { .. } => "AWAITING_CLARIFICATION_OR_ALTERNATIVES",
            Step::IntentReady { .. } => "INTENT_READY",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::IntentReady { .. })
    }

    /// Catalog of the current round, when one exists
    pub fn catalog(&self) -> Option<&CandidateCatalog> {
        match self {
            Step::AwaitingValidation { catalog, .. } | Step::AwaitingClarificationOrAlternatives { catalog, .. } => {
                Some(catalog)
            }
            _ => None,
        }
    }

    pub fn picks(&self) -> Option<&Picks> {
        match self {
            Step::AwaitingValidation { picks, .. } => Some(picks),
            _ => None,
        }
    }

    pub fn intent(&self) -> Option<&FinalIntent> {
        match self {
            Step::IntentReady { intent } => Some(intent),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
